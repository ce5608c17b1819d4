//! Error types for the driver

use annex_transform::TransformError;
use thiserror::Error;

use crate::analyzer::StructuralError;

#[derive(Debug, Error)]
pub enum CompileError {
    /// An internal invariant does not hold; never user-fixable
    #[error("{0}")]
    Consistency(String),

    /// The API was driven in an unsupported order or with invalid input
    #[error("{0}")]
    Usage(String),

    /// Source the metadata analyzer could not make sense of
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Config(String),
}

impl CompileError {
    pub fn is_structural(&self) -> bool {
        matches!(self, CompileError::Structural(_))
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
