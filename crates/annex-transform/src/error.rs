//! Error types for source transforms

use thiserror::Error;

/// Failure that aborts a transform. Recoverable findings are recorded as
/// diagnostics on the transform context instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// A resource could not be resolved or loaded for inlining
    #[error("{0}")]
    Resource(String),

    /// Decorator arguments or metadata have an unexpected shape
    #[error("{0}")]
    InvalidArgument(String),
}
