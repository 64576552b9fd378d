//! Relationship parts (`_rels/*.rels`).
//!
//! A relationship part is an ordered list of typed references from one source
//! part to its targets. Targets are either internal part references, resolved
//! relative to the source part's directory, or external URIs.

use crate::common::xml::{XmlDocument, XmlElement, unescape_xml};
use crate::ooxml::opc::constants::{namespace, target_mode};
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use std::fmt;

/// Relationship identifier token, `"rId"` followed by a decimal number.
///
/// Tokens that do not follow the `rId<n>` shape are still representable so
/// that foreign packages load; they just have no [`number`](Self::number).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipId(String);

impl RelationshipId {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Build `rId<n>`.
    pub fn from_number(n: u32) -> Self {
        let mut buf = itoa::Buffer::new();
        Self(format!("rId{}", buf.format(n)))
    }

    /// Decimal suffix of an `rId<n>` token.
    pub fn number(&self) -> Option<u32> {
        let digits = self.0.strip_prefix("rId")?;
        if digits.is_empty() {
            return None;
        }
        atoi_simd::parse::<u32, false, false>(digits.as_bytes()).ok()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RelationshipId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

/// Whether a target reference points outside the package.
pub fn is_external_target(target: &str) -> bool {
    const SCHEMES: [&str; 4] = ["http:", "https:", "mailto:", "file:"];
    let lower = target.trim_start().to_ascii_lowercase();
    SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}

/// A single relationship record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    id: RelationshipId,
    reltype: String,
    target_ref: String,
    external: bool,
}

impl Relationship {
    /// Create a relationship; external-ness is inferred from the target.
    pub fn new(id: RelationshipId, reltype: impl Into<String>, target_ref: impl Into<String>) -> Self {
        let target_ref = target_ref.into();
        let external = is_external_target(&target_ref);
        Self {
            id,
            reltype: reltype.into(),
            target_ref,
            external,
        }
    }

    #[inline]
    pub fn id(&self) -> &RelationshipId {
        &self.id
    }

    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Relative part reference, or an absolute URI for external targets.
    #[inline]
    pub fn target_ref(&self) -> &str {
        &self.target_ref
    }

    #[inline]
    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn set_target_ref(&mut self, target_ref: impl Into<String>) {
        self.target_ref = target_ref.into();
    }

    pub fn set_id(&mut self, id: RelationshipId) {
        self.id = id;
    }

    /// Absolute part name of an internal target.
    ///
    /// # Arguments
    /// * `base_uri` - Directory of the source part
    pub fn target_partname(&self, base_uri: &str) -> Result<PackURI> {
        if self.external {
            return Err(OpcError::InvalidRelationship(format!(
                "{} is external and has no part name",
                self.id
            )));
        }
        PackURI::from_rel_ref(base_uri, &self.target_ref)
    }
}

/// Ordered relationships of one source part.
#[derive(Debug, Clone)]
pub struct Relationships {
    source: PackURI,
    rels: Vec<Relationship>,
}

impl Relationships {
    /// Create an empty collection for a source part.
    pub fn new(source: PackURI) -> Self {
        Self {
            source,
            rels: Vec::new(),
        }
    }

    /// Read relationships from a parsed `.rels` document.
    ///
    /// # Arguments
    /// * `source` - The part these relationships belong to
    /// * `doc` - Parsed relationship part
    pub fn from_document(source: PackURI, doc: &XmlDocument) -> Result<Self> {
        let mut rels = Vec::new();
        for el in doc.root().children_named("Relationship") {
            let field = |key: &str| {
                el.attr(key).map(unescape_xml).ok_or_else(|| {
                    OpcError::InvalidRelationship(format!(
                        "relationship in {} lacks {}",
                        source.rels_uri(),
                        key
                    ))
                })
            };
            let id = RelationshipId::new(field("Id")?);
            let reltype = field("Type")?;
            let target_ref = field("Target")?;
            let mut rel = Relationship::new(id, reltype, target_ref);
            if el.attr("TargetMode") == Some(target_mode::EXTERNAL) {
                rel.external = true;
            }
            rels.push(rel);
        }
        Ok(Self { source, rels })
    }

    /// Build the `.rels` document for these relationships, in insertion order.
    pub fn to_document(&self) -> XmlDocument {
        let mut root = XmlElement::new("Relationships").with_attr("xmlns", namespace::OPC_RELATIONSHIPS);
        for rel in &self.rels {
            let mut el = XmlElement::new("Relationship")
                .with_attr("Id", rel.id.as_str())
                .with_attr("Type", &rel.reltype)
                .with_attr("Target", &rel.target_ref);
            if rel.external {
                el.set_attr("TargetMode", target_mode::EXTERNAL);
            }
            root.push_child(el);
        }
        XmlDocument::new(root)
    }

    /// The part these relationships belong to.
    #[inline]
    pub fn source(&self) -> &PackURI {
        &self.source
    }

    pub fn set_source(&mut self, source: PackURI) {
        self.source = source;
    }

    #[inline]
    pub fn get(&self, id: &RelationshipId) -> Option<&Relationship> {
        self.rels.iter().find(|rel| &rel.id == id)
    }

    pub fn get_mut(&mut self, id: &RelationshipId) -> Option<&mut Relationship> {
        self.rels.iter_mut().find(|rel| &rel.id == id)
    }

    /// First relationship of a type.
    pub fn first_of_type(&self, reltype: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.reltype == reltype)
    }

    pub fn push(&mut self, rel: Relationship) {
        self.rels.push(rel);
    }

    /// Remove a relationship by id.
    pub fn remove(&mut self, id: &RelationshipId) -> Option<Relationship> {
        let pos = self.rels.iter().position(|rel| &rel.id == id)?;
        Some(self.rels.remove(pos))
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Relationship> {
        self.rels.iter_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Resolve a relationship's target against this collection's source part.
    pub fn target_partname(&self, rel: &Relationship) -> Result<PackURI> {
        rel.target_partname(self.source.base_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::opc::constants::relationship_type as rt;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image1.png"/><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/></Relationships>"#;

    #[test]
    fn relationship_id_numbers() {
        assert_eq!(RelationshipId::from_number(14).as_str(), "rId14");
        assert_eq!(RelationshipId::new("rId7").number(), Some(7));
        assert_eq!(RelationshipId::new("rIdX").number(), None);
        assert_eq!(RelationshipId::new("rId").number(), None);
        assert_eq!(RelationshipId::new("hlink1").number(), None);
    }

    #[test]
    fn external_targets() {
        assert!(is_external_target("https://example.com"));
        assert!(is_external_target("MAILTO:someone@example.com"));
        assert!(!is_external_target("../media/image1.png"));
    }

    #[test]
    fn parses_in_document_order() {
        let doc = XmlDocument::parse_str(RELS).unwrap();
        let rels = Relationships::from_document(PackURI::slide(1), &doc).unwrap();
        let ids: Vec<_> = rels.iter().map(|r| r.id().as_str()).collect();
        assert_eq!(ids, vec!["rId2", "rId1", "rId3"]);

        let layout = rels.first_of_type(rt::SLIDE_LAYOUT).unwrap();
        assert_eq!(
            rels.target_partname(layout).unwrap().as_str(),
            "/ppt/slideLayouts/slideLayout1.xml"
        );

        let link = rels.get(&RelationshipId::new("rId3")).unwrap();
        assert!(link.is_external());
        assert_eq!(link.target_ref(), "https://example.com/?a=1&b=2");
        assert!(rels.target_partname(link).is_err());
    }

    #[test]
    fn serializes_back() {
        let doc = XmlDocument::parse_str(RELS).unwrap();
        let rels = Relationships::from_document(PackURI::slide(1), &doc).unwrap();
        let again = Relationships::from_document(PackURI::slide(1), &rels.to_document()).unwrap();
        assert_eq!(again.iter().collect::<Vec<_>>(), rels.iter().collect::<Vec<_>>());
        assert!(rels.to_document().to_xml_string().contains(r#"TargetMode="External""#));
    }

    #[test]
    fn missing_attributes_are_rejected() {
        let doc = XmlDocument::parse_str(
            r#"<Relationships><Relationship Id="rId1" Target="x.xml"/></Relationships>"#,
        )
        .unwrap();
        assert!(Relationships::from_document(PackURI::slide(1), &doc).is_err());
    }
}
