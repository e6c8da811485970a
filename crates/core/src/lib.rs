pub mod arith;
pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod result;
pub mod seed;

pub use printer::PrintConfig;
pub use result::{Error, Result};
pub use seed::Seed;

use ast::{Expression, Module, Statement};

/// Conversion between BSL source text and syntax trees.
///
/// Obfuscation passes never touch text directly: they receive parsed trees and
/// use the codec whenever a fragment has to become text again, e.g. when a
/// statement is wrapped into `Выполнить`.
pub trait SourceCodec: Send + Sync {
    /// Parses a whole module.
    fn parse(&self, source: &str) -> Result<Module>;

    /// Renders a module with the given layout.
    fn print(&self, module: &Module, config: PrintConfig) -> String;

    /// Single-line text of a statement, without the trailing `;`.
    fn serialize_statement(&self, statement: &Statement) -> String;

    /// Single-line text of an expression.
    fn serialize_expression(&self, expression: &Expression) -> String;

    /// Parses a standalone expression such as a generated predicate.
    fn parse_expression(&self, source: &str) -> Result<Expression>;

    /// Parses a statement sequence outside of any routine.
    fn parse_statements(&self, source: &str) -> Result<Vec<Statement>>;
}

/// The built-in codec for 1C:Enterprise BSL.
#[derive(Clone, Copy, Debug, Default)]
pub struct BslCodec;

impl SourceCodec for BslCodec {
    fn parse(&self, source: &str) -> Result<Module> {
        parser::parse_module(source)
    }

    fn print(&self, module: &Module, config: PrintConfig) -> String {
        printer::print_module(module, config)
    }

    fn serialize_statement(&self, statement: &Statement) -> String {
        printer::serialize_statement(statement)
    }

    fn serialize_expression(&self, expression: &Expression) -> String {
        printer::serialize_expression(expression)
    }

    fn parse_expression(&self, source: &str) -> Result<Expression> {
        parser::parse_expression(source)
    }

    fn parse_statements(&self, source: &str) -> Result<Vec<Statement>> {
        parser::parse_statements(source)
    }
}

/// Reads a source file, stripping a UTF-8 byte order mark.
pub fn read_source(path: &str) -> Result<String> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.to_string(),
        source,
    })?;
    Ok(text.trim_start_matches('\u{feff}').to_string())
}
