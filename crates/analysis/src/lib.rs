pub mod metrics;
pub use metrics::{collect_metrics, compare, Metrics};

use thiserror::Error;

/// Error type for metrics computation.
#[derive(Debug, Error)]
pub enum Error {
    /// The module declares nothing and has no body.
    #[error("module is empty")]
    EmptyModule,
}

/// Analysis result type
pub type Result<T> = std::result::Result<T, Error>;
