//! Command-line interface of the murk obfuscator.

pub mod commands;
