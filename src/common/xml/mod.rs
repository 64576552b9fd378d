//! XML helpers shared by every package part: entity escaping and an owned,
//! round-trippable element tree.

pub mod escape;
pub mod tree;

pub use escape::{escape_xml, unescape_xml};
pub use tree::{Declaration, XmlDocument, XmlElement, XmlError, XmlNode};
