use async_trait::async_trait;
use clap::Subcommand;
use std::error::Error;

pub mod obfuscate;
pub mod verify;

use thiserror::Error;

/// Errors raised by the subcommands themselves.
#[derive(Debug, Error)]
pub enum CommandError {
    /// File read/write error.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// The seed given on the command line is malformed.
    #[error("invalid seed: {0}")]
    InvalidSeed(murk_core::Error),
    /// A routine argument is not a literal.
    #[error("invalid argument '{0}'")]
    InvalidArgument(String),
    /// The two modules behaved differently.
    #[error("modules behave differently when calling '{0}'")]
    Mismatch(String),
}

/// CLI subcommands for Murk.
#[derive(Subcommand)]
pub enum Cmd {
    /// Obfuscate a module with the selected techniques.
    Obfuscate(obfuscate::ObfuscateArgs),
    /// Check that an obfuscated module behaves like the original.
    Verify(verify::VerifyArgs),
}

/// Trait for executing CLI subcommands.
///
/// Implementors read their input modules, run the corresponding pipeline and
/// write the result to stdout or a file.
#[async_trait]
pub trait Command {
    /// Executes the subcommand.
    ///
    /// # Returns
    /// A `Result` indicating success or an error if execution fails.
    async fn execute(self) -> Result<(), Box<dyn Error>>;
}

#[async_trait]
impl Command for Cmd {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        match self {
            Cmd::Obfuscate(args) => args.execute().await,
            Cmd::Verify(args) => args.execute().await,
        }
    }
}
