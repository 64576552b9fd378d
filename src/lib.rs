//! Slidesmith - consistency engine for editing PowerPoint packages
//!
//! Edits an extracted `.pptx` package in place: inserts blank, copied and
//! template slides, removes slides, attaches click-triggered animations, and
//! keeps everything that must agree across parts in agreement.
//!
//! # Features
//!
//! - **Package-wide shape ids**: every drawable object keeps an id no other
//!   shape in the package uses, including the shapes of copied slides
//! - **Relationship ids**: allocated package-wide; media references never
//!   share an id
//! - **Slide ordering**: physical `slideN.xml` numbering and the presentation's
//!   slide list move together
//! - **Animation timing**: append-only click triggers and effects whose shape
//!   targets survive copying
//! - **Validation**: read-only checks reported as errors and warnings
//!
//! # Example
//!
//! ```no_run
//! use slidesmith::{EditorConfig, PackageEditor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EditorConfig::from_yaml_file("slidesmith.yaml")?;
//! let editor = PackageEditor::open("extracted-deck/", config)?;
//!
//! let index = editor.insert_blank_slide(2, Some("Findings"))?;
//! println!("New slide at {}", index);
//!
//! let report = editor.validate();
//! for finding in report.errors.iter().chain(&report.warnings) {
//!     println!("{}", finding);
//! }
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod ooxml;

pub use common::{EditorConfig, Error, Result};
pub use ooxml::pptx::{PackageEditor, ValidationReport};
