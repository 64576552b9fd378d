//! Error conversion implementations.
//!
//! Maps low-level package errors onto the public [`Error`] taxonomy.

use super::types::Error;
use crate::ooxml::opc::error::OpcError;

impl From<OpcError> for Error {
    fn from(err: OpcError) -> Self {
        match err {
            OpcError::PackageNotFound(s) => Error::NotFound(format!("package directory {}", s)),
            OpcError::PartNotFound(s) => Error::NotFound(format!("part {}", s)),
            OpcError::RelationshipNotFound(s) => Error::NotFound(format!("relationship {}", s)),
            OpcError::InvalidPackUri(s) => Error::Structural(format!("invalid part name: {}", s)),
            OpcError::InvalidRelationship(s) => Error::Structural(s),
            e @ OpcError::Xml { .. } => Error::Structural(e.to_string()),
            OpcError::Io { path, source } => Error::Io { path, source },
            #[cfg(feature = "archive")]
            OpcError::Zip(e) => Error::Archive(e.to_string()),
            OpcError::Archive(s) => Error::Archive(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn maps_onto_taxonomy() {
        let err: Error = OpcError::PartNotFound("/ppt/slides/slide4.xml".into()).into();
        assert!(matches!(err, Error::NotFound(ref s) if s.contains("slide4")));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = OpcError::Io {
            path: PathBuf::from("/x"),
            source: io,
        }
        .into();
        assert!(matches!(err, Error::Io { ref path, .. } if path == &PathBuf::from("/x")));
    }
}
