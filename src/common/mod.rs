//! Types and utilities shared across the package layers.

pub mod config;
pub mod error;
pub mod xml;

// Re-exports for convenience
pub use config::EditorConfig;
pub use error::{Error, Result};
