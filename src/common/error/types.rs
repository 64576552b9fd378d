//! Public error taxonomy for package editing.
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for slidesmith operations.
///
/// Validation problems are never reported through this type; they come back
/// as findings in a [`ValidationReport`](crate::ooxml::pptx::ValidationReport).
#[derive(Error, Debug)]
pub enum Error {
    /// A registry, parser or configuration source failed to initialize
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Referenced slide, relationship or part does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A required part is missing or malformed
    #[error("Structural error: {0}")]
    Structural(String),

    /// Filesystem failure while reading, writing or renaming a part
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive extraction or compression failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// A structural operation failed part-way. The package may be inconsistent.
    #[error("Operation '{operation}' failed: {source}")]
    Operation {
        operation: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap an error raised inside a structural operation.
    ///
    /// Already-wrapped errors are not wrapped twice.
    pub fn operation(operation: impl Into<String>, source: Error) -> Self {
        match source {
            err @ Error::Operation { .. } => err,
            other => Error::Operation {
                operation: operation.into(),
                source: Box::new(other),
            },
        }
    }

    /// Whether the package may have been left half-modified.
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, Error::Operation { .. })
    }
}

/// Result type for slidesmith operations.
pub type Result<T> = std::result::Result<T, Error>;
