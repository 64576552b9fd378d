/// Error types for OPC package operations
use crate::common::xml::XmlError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("Package directory not found: {0}")]
    PackageNotFound(String),

    #[error("Invalid pack URI: {0}")]
    InvalidPackUri(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("Invalid relationship: {0}")]
    InvalidRelationship(String),

    #[error("Malformed part {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: XmlError,
    },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "archive")]
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive error: {0}")]
    Archive(String),
}

impl OpcError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        OpcError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn xml(part: impl Into<String>, source: XmlError) -> Self {
        OpcError::Xml {
            part: part.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
