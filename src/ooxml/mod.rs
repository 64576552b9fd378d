//! Office Open XML packages.
//!
//! Two layers:
//!
//! 1. **OPC layer** (`opc`): part names, relationship parts, the content-type
//!    manifest and physical access to an extracted package
//! 2. **PresentationML layer** (`pptx`): slide, shape and timing semantics on
//!    top of the OPC layer, and the editing operations that keep them
//!    consistent

pub mod opc;
pub mod pptx;
