//! Identifier regeneration for copied slide content.
//!
//! A copied slide must not share any shape id with the rest of the package,
//! yet everything inside it that points at its own shapes (animation targets,
//! build list entries, connector endpoints) has to keep pointing at the same
//! shapes. Regeneration allocates a fresh id for every shape, records the
//! old → new mapping, then rewrites every reference whose id is a mapping key.
//!
//! References to ids outside the mapping are left alone; they are assumed to
//! point at layout or master content shared by the slide.

use crate::common::{Error, Result};
use crate::common::xml::{XmlDocument, XmlElement, unescape_xml};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::pptx::ids::{RelationshipId, ShapeId};
use crate::ooxml::pptx::registry::{ShapeInfo, ShapeRegistry};
use crate::ooxml::pptx::slide;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Animation target leaves, whose `spid` names a shape.
const TARGET_REFERENCES: [&str; 2] = ["spTgt", "inkTgt"];

/// Build list entries, whose `spid` names a shape.
const BUILD_REFERENCES: [&str; 4] = ["bldP", "bldGraphic", "bldDgm", "bldOleChart"];

/// Connector endpoints, whose `id` names a shape.
const CONNECTION_REFERENCES: [&str; 2] = ["stCxn", "endCxn"];

/// Outcome of [`regenerate_shape_ids`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Regeneration {
    /// Old id → fresh id, for every well-formed id found in the content
    pub mapping: BTreeMap<ShapeId, ShapeId>,
    /// Shapes that received a fresh id
    pub shapes_processed: usize,
    /// Animation target leaves rewritten through the mapping
    pub references_updated: usize,
    /// Build list entries and connector endpoints rewritten through the mapping
    pub secondary_references_updated: usize,
}

/// Give every shape in `doc` a fresh id registered under `dest_slide`, and
/// rewrite the slide's internal shape references to match.
///
/// No id in the resulting content was registered before the call. A shape
/// whose id is malformed or repeats an earlier shape's id still gets a fresh
/// id, but only the first occurrence of an id enters the mapping.
///
/// # Errors
/// [`Error::Structural`] when the shape id
/// space is exhausted; the content is then partly renumbered.
pub fn regenerate_shape_ids(doc: &mut XmlDocument, dest_slide: u32, registry: &ShapeRegistry) -> Result<Regeneration> {
    let mut result = Regeneration::default();
    let mut failure: Option<Error> = None;

    slide::for_each_identity_mut(doc.root_mut(), &mut |cnvpr: &mut XmlElement| {
        if failure.is_some() {
            return;
        }
        let old = cnvpr.attr("id").and_then(ShapeId::parse);
        let fresh = match registry.allocate_unique() {
            Ok(fresh) => fresh,
            Err(e) => {
                failure = Some(e);
                return;
            },
        };
        let name = cnvpr.attr("name").map(unescape_xml).unwrap_or_default();
        registry.register(fresh, ShapeInfo { slide: dest_slide, name });
        cnvpr.set_attr("id", &fresh.to_string());
        result.shapes_processed += 1;

        match old {
            Some(old) if !result.mapping.contains_key(&old) => {
                result.mapping.insert(old, fresh);
            },
            Some(old) => debug!("Shape id {} repeats within the slide; not remapping references to {}", old, fresh),
            None => debug!("Replaced malformed shape id with {}", fresh),
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    let mapping = &result.mapping;
    let mut updated = 0;
    let mut secondary = 0;
    let mut unresolved = BTreeSet::new();
    doc.root_mut().walk_mut(&mut |el: &mut XmlElement| {
        let local = el.local_name();
        let (key, target) = if TARGET_REFERENCES.contains(&local) {
            ("spid", true)
        } else if BUILD_REFERENCES.contains(&local) {
            ("spid", false)
        } else if CONNECTION_REFERENCES.contains(&local) {
            ("id", false)
        } else {
            return;
        };
        let Some(old) = el.attr(key).and_then(ShapeId::parse) else {
            return;
        };
        match mapping.get(&old) {
            Some(new) => {
                el.set_attr(key, &new.to_string());
                if target {
                    updated += 1;
                } else {
                    secondary += 1;
                }
            },
            None => {
                unresolved.insert(old);
            },
        }
    });
    result.references_updated = updated;
    result.secondary_references_updated = secondary;

    if !unresolved.is_empty() {
        debug!(
            "Left {} shape references outside the slide untouched: {:?}",
            unresolved.len(),
            unresolved
        );
    }
    debug!(
        "Regenerated {} shape ids for slide {}, {} references updated",
        result.shapes_processed, dest_slide, result.references_updated
    );
    Ok(result)
}

/// Rewrite relationship references (`r:id`, `r:embed`, `r:link`, ...)
/// through an old → new relationship id map. Returns how many attributes
/// changed.
pub fn remap_relationship_refs(doc: &mut XmlDocument, mapping: &BTreeMap<RelationshipId, RelationshipId>) -> usize {
    if mapping.is_empty() {
        return 0;
    }
    let prefixes = relationship_prefixes(doc.root());
    let mut updated = 0;
    doc.root_mut().walk_mut(&mut |el: &mut XmlElement| {
        for (key, value) in el.attributes_mut() {
            let in_namespace = key
                .split_once(':')
                .is_some_and(|(prefix, _)| prefixes.contains(prefix));
            if !in_namespace {
                continue;
            }
            if let Some(new) = mapping.get(&RelationshipId::new(value.as_str())) {
                *value = new.as_str().to_string();
                updated += 1;
            }
        }
    });
    updated
}

/// Prefixes bound to the office relationships namespace anywhere in the tree.
fn relationship_prefixes(root: &XmlElement) -> BTreeSet<String> {
    let mut prefixes: BTreeSet<String> = std::iter::once(root)
        .chain(root.descendants())
        .flat_map(|el| el.attributes())
        .filter(|(_, value)| *value == namespace::OFC_RELATIONSHIPS)
        .filter_map(|(key, _)| key.strip_prefix("xmlns:"))
        .map(str::to_string)
        .collect();
    if prefixes.is_empty() {
        prefixes.insert("r".to_string());
    }
    prefixes
}
