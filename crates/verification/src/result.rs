//! Verification results and error types

use thiserror::Error;

/// Main error type for verification operations
#[derive(Error, Debug)]
pub enum Error {
    /// One of the modules failed to parse.
    #[error(transparent)]
    Core(#[from] murk_core::Error),
    /// The program raised an exception or hit an unsupported construct.
    #[error("runtime error: {0}")]
    Runtime(String),
    /// Execution did not finish within the statement budget.
    #[error("step limit of {0} statements exceeded")]
    StepLimit(usize),
}

impl Error {
    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

/// Result type for verification operations
pub type Result<T> = std::result::Result<T, Error>;
