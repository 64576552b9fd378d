//! The presentation's ordered slide list (`p:sldIdLst`).
//!
//! Each `p:sldId` carries a numeric id and a relationship token; the token
//! resolves through the presentation's relationships to a slide part. The
//! order of the entries is the presentation order.

use crate::common::xml::{XmlDocument, XmlElement, XmlNode};
use crate::common::{Error, Result};
use crate::ooxml::opc::constants::{namespace, part_name, relationship_type};
use crate::ooxml::opc::{PackURI, PackageDir, Relationship, Relationships};
use crate::ooxml::pptx::ids::RelationshipId;
use tracing::debug;

/// Smallest numeric slide id PowerPoint accepts.
const MIN_SLIDE_ID: u32 = 256;

/// Elements that precede `p:sldIdLst` in `p:presentation`.
const BEFORE_SLIDE_LIST: [&str; 3] = ["sldMasterIdLst", "notesMasterIdLst", "handoutMasterIdLst"];

/// One `p:sldId`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideListEntry {
    pub id: u32,
    pub rel_id: RelationshipId,
}

/// The presentation part together with its relationships.
#[derive(Debug, Clone)]
pub struct SlideList {
    doc: XmlDocument,
    rels: Relationships,
}

/// Key of the relationship attribute (`r:id`) on a `p:sldId`.
fn rel_attr_key(el: &XmlElement) -> Option<&str> {
    el.attributes()
        .map(|(key, _)| key)
        .find(|key| key.ends_with(":id") && !key.starts_with("xmlns"))
}

fn entry_of(el: &XmlElement) -> Option<SlideListEntry> {
    let id = atoi_simd::parse::<u32, false, false>(el.attr("id")?.as_bytes()).ok()?;
    let rel_id = RelationshipId::new(el.attr(rel_attr_key(el)?)?);
    Some(SlideListEntry { id, rel_id })
}

impl SlideList {
    /// Read `/ppt/presentation.xml` and its relationships.
    ///
    /// # Errors
    /// [`Error::Structural`] if the presentation part is missing.
    pub fn load(dir: &PackageDir) -> Result<Self> {
        let uri = PackURI::new(part_name::PRESENTATION)?;
        let doc = dir
            .read_xml_opt(&uri)?
            .ok_or_else(|| Error::Structural("presentation part is missing".to_string()))?;
        let rels = dir.read_rels(&uri)?;
        Ok(Self { doc, rels })
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn relationships(&self) -> &Relationships {
        &self.rels
    }

    pub fn has_list(&self) -> bool {
        self.doc.root().child("sldIdLst").is_some()
    }

    /// Entries in presentation order. Malformed `p:sldId` elements are skipped.
    pub fn entries(&self) -> Vec<SlideListEntry> {
        self.doc
            .root()
            .child("sldIdLst")
            .map(|list| list.children_named("sldId").filter_map(entry_of).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Physical slide index an entry points at.
    pub fn slide_index_of(&self, entry: &SlideListEntry) -> Option<u32> {
        let rel = self.rels.get(&entry.rel_id)?;
        let target = self.rels.target_partname(rel).ok()?;
        target.is_slide().then(|| target.idx()).flatten()
    }

    /// Physical slide indices in presentation order.
    pub fn slide_order(&self) -> Vec<Option<u32>> {
        self.entries()
            .iter()
            .map(|entry| self.slide_index_of(entry))
            .collect()
    }

    /// Retarget presentation references to slide `from` or later by `delta`.
    /// Returns how many references moved.
    pub fn shift_from(&mut self, from: u32, delta: i32) -> usize {
        let base = self.rels.source().base_uri().to_string();
        let mut moved = 0;
        for rel in self.rels.iter_mut() {
            if rel.reltype() != relationship_type::SLIDE || rel.is_external() {
                continue;
            }
            let Ok(target) = PackURI::from_rel_ref(&base, rel.target_ref()) else {
                continue;
            };
            if let Some(index) = target.idx().filter(|index| target.is_slide() && *index >= from) {
                let new_target = PackURI::slide(index.saturating_add_signed(delta));
                rel.set_target_ref(new_target.relative_ref(&base));
                moved += 1;
            }
        }
        debug!("Retargeted {} slide references from slide {} by {}", moved, from, delta);
        moved
    }

    /// Add a presentation → slide relationship.
    pub fn add_slide_relationship(&mut self, rel_id: RelationshipId, slide: u32) {
        let target = PackURI::slide(slide).relative_ref(self.rels.source().base_uri());
        self.rels
            .push(Relationship::new(rel_id, relationship_type::SLIDE, target));
    }

    /// Insert an entry for the slide at physical index `position`, ahead of
    /// the first entry pointing at `position` or later.
    ///
    /// The relationship `rel_id` must already point at the slide. The list
    /// is created when the presentation has none.
    ///
    /// # Returns
    /// The numeric id given to the entry.
    pub fn insert_entry(&mut self, position: u32, rel_id: &RelationshipId) -> Result<u32> {
        let entries = self.entries();
        let id = entries
            .iter()
            .map(|entry| entry.id)
            .max()
            .map_or(MIN_SLIDE_ID, |max| max.saturating_add(1).max(MIN_SLIDE_ID));
        let before = entries
            .iter()
            .position(|entry| self.slide_index_of(entry).is_some_and(|index| index >= position));

        let root = self.doc.root_mut();
        if root.child("sldIdLst").is_none() {
            let index = root
                .children()
                .iter()
                .enumerate()
                .filter(|(_, node)| {
                    matches!(node, XmlNode::Element(el)
                        if BEFORE_SLIDE_LIST.contains(&el.local_name()))
                })
                .map(|(i, _)| i + 1)
                .last()
                .unwrap_or(0);
            root.insert_child(index, XmlElement::new(root.qualified("sldIdLst")));
        }
        let rel_prefix = root
            .attributes()
            .find(|(key, value)| {
                key.starts_with("xmlns:")
                    && *value == namespace::OFC_RELATIONSHIPS
            })
            .map(|(key, _)| key.trim_start_matches("xmlns:").to_string())
            .unwrap_or_else(|| "r".to_string());
        let list = root
            .child_mut("sldIdLst")
            .ok_or_else(|| Error::Structural("slide list could not be created".to_string()))?;

        let mut buf = itoa::Buffer::new();
        let el = XmlElement::new(list.qualified("sldId"))
            .with_attr("id", buf.format(id))
            .with_attr(&format!("{}:id", rel_prefix), rel_id.as_str());
        // Map the entry position onto a node index
        let node_index = match before {
            Some(pos) => list
                .children()
                .iter()
                .enumerate()
                .filter(|(_, node)| matches!(node, XmlNode::Element(el) if el.is("sldId")))
                .nth(pos)
                .map_or(list.children().len(), |(i, _)| i),
            None => list.children().len(),
        };
        list.insert_child(node_index, el);
        debug!("Inserted slide list entry {} ({}) for slide {}", id, rel_id, position);
        Ok(id)
    }

    /// Remove the entry pointing at a physical index together with its
    /// presentation relationship.
    pub fn remove_entry_for(&mut self, index: u32) -> Option<SlideListEntry> {
        let entry = self
            .entries()
            .into_iter()
            .find(|entry| self.slide_index_of(entry) == Some(index))?;
        if let Some(list) = self.doc.root_mut().child_mut("sldIdLst") {
            list.remove_children_where(|el| {
                el.is("sldId") && entry_of(el).is_some_and(|e| e.rel_id == entry.rel_id)
            });
        }
        self.rels.remove(&entry.rel_id);
        debug!("Removed slide list entry {} ({})", entry.id, entry.rel_id);
        Some(entry)
    }

    /// Write the presentation part and its relationships.
    pub fn save(&self, dir: &PackageDir) -> Result<()> {
        dir.write_xml(self.rels.source(), &self.doc)?;
        dir.write_rels(&self.rels)?;
        Ok(())
    }
}
