/// Open Packaging Conventions (OPC) layer.
///
/// Everything here is independent of PresentationML semantics:
///
/// - Pack URIs and their relationship-part pairing
/// - Relationship parts and relationship id tokens
/// - The content-type manifest
/// - Part-level access to an extracted package directory
/// - Archive extraction and compression (feature `archive`)
#[cfg(feature = "archive")]
pub mod archive;
pub mod constants;
pub mod content_types;
pub mod error;
pub mod packuri;
pub mod phys_pkg;
pub mod rel;

// Re-export commonly used types
pub use content_types::ContentTypes;
pub use error::OpcError;
pub use packuri::PackURI;
pub use phys_pkg::PackageDir;
pub use rel::{Relationship, RelationshipId, Relationships, is_external_target};
