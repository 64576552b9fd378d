//! The package manifest, `[Content_Types].xml`.
//!
//! Declares a content type either per extension (`Default`) or per part name
//! (`Override`). Slide parts are always declared through overrides.

use crate::common::xml::{XmlDocument, XmlElement};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::opc::packuri::PackURI;

/// Parsed `[Content_Types].xml`, edited in place.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    doc: XmlDocument,
}

impl ContentTypes {
    /// An empty manifest.
    pub fn new() -> Self {
        let root = XmlElement::new("Types").with_attr("xmlns", namespace::OPC_CONTENT_TYPES);
        Self {
            doc: XmlDocument::new(root),
        }
    }

    pub fn from_document(doc: XmlDocument) -> Self {
        Self { doc }
    }

    #[inline]
    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    /// Whether an override exists for this part name.
    pub fn has_override(&self, partname: &PackURI) -> bool {
        self.override_for(partname).is_some()
    }

    /// Content type declared by the override for this part name.
    pub fn override_for(&self, partname: &PackURI) -> Option<&str> {
        self.doc
            .root()
            .children_named("Override")
            .find(|el| el.attr("PartName") == Some(partname.as_str()))
            .and_then(|el| el.attr("ContentType"))
    }

    /// Whether a default is declared for an extension (case-insensitive).
    pub fn has_default(&self, ext: &str) -> bool {
        self.doc
            .root()
            .children_named("Default")
            .any(|el| el.attr("Extension").is_some_and(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Declare `content_type` for `partname` unless an override already
    /// exists. Returns whether an override was added.
    pub fn ensure_override(&mut self, partname: &PackURI, content_type: &str) -> bool {
        if self.has_override(partname) {
            return false;
        }
        let root = self.doc.root_mut();
        let el = XmlElement::new(root.qualified("Override"))
            .with_attr("PartName", partname.as_str())
            .with_attr("ContentType", content_type);
        root.push_child(el);
        true
    }

    /// Declare a default for an extension unless one exists. Defaults are
    /// kept ahead of overrides.
    pub fn ensure_default(&mut self, ext: &str, content_type: &str) -> bool {
        if self.has_default(ext) {
            return false;
        }
        let root = self.doc.root_mut();
        let el = XmlElement::new(root.qualified("Default"))
            .with_attr("Extension", ext)
            .with_attr("ContentType", content_type);
        let index = root.child_index("Override").unwrap_or(root.children().len());
        root.insert_child(index, el);
        true
    }

    /// Remove the override for this part name. Returns whether one existed.
    pub fn remove_override(&mut self, partname: &PackURI) -> bool {
        self.doc
            .root_mut()
            .remove_children_where(|el| {
                el.is("Override") && el.attr("PartName") == Some(partname.as_str())
            })
            > 0
    }
}

impl Default for ContentTypes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::content_type as ct;

    #[test]
    fn ensure_override_is_idempotent() {
        let mut types = ContentTypes::new();
        let slide = PackURI::slide(1);
        assert!(!types.has_override(&slide));
        assert!(types.ensure_override(&slide, ct::PML_SLIDE));
        assert!(!types.ensure_override(&slide, ct::PML_SLIDE));
        assert_eq!(types.override_for(&slide), Some(ct::PML_SLIDE));
        assert_eq!(types.document().root().children_named("Override").count(), 1);
    }

    #[test]
    fn defaults_precede_overrides() {
        let mut types = ContentTypes::new();
        types.ensure_override(&PackURI::slide(1), ct::PML_SLIDE);
        assert!(types.ensure_default("png", ct::PNG));
        assert!(types.has_default("PNG"));
        let first = types.document().root().elements().next().unwrap();
        assert!(first.is("Default"));
    }

    #[test]
    fn remove_override() {
        let mut types = ContentTypes::new();
        types.ensure_override(&PackURI::slide(2), ct::PML_SLIDE);
        assert!(types.remove_override(&PackURI::slide(2)));
        assert!(!types.remove_override(&PackURI::slide(2)));
    }
}
