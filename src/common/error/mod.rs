//! Unified error types for slidesmith.
//!
//! Low-level package failures ([`OpcError`](crate::ooxml::opc::OpcError)) are
//! converted into the public [`Error`] taxonomy at the editor boundary.

// Submodule declarations
pub mod conversions;
pub mod types;

// Re-exports
pub use types::{Error, Result};
