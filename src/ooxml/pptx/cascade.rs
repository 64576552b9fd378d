//! Slide insertion and removal.
//!
//! Slide order lives in two places that must move together: the physical
//! part names (`slideN.xml`, contiguous from 1) and the presentation's slide
//! list, whose relationships point at those part names. Inserting at
//! position P renames slides P..=C up by one (highest first, so no rename
//! lands on a file that has not moved yet), writes the new slide at P,
//! retargets the slide list and adds the new entry, then declares the new
//! part in the manifest.
//!
//! Nothing here is transactional. A failure part-way leaves the package
//! half-renumbered; callers receive the error and own the cleanup.

use crate::common::xml::XmlDocument;
use crate::common::{Error, Result};
use crate::ooxml::opc::constants::{content_type, part_name, relationship_type};
use crate::ooxml::opc::{ContentTypes, PackURI, PackageDir, Relationships};
use crate::ooxml::pptx::ids::RelationshipId;
use crate::ooxml::pptx::registry::{RelationshipInfo, RelationshipRegistry, ShapeRegistry};
use crate::ooxml::pptx::rewrite::{Regeneration, regenerate_shape_ids, remap_relationship_refs};
use crate::ooxml::pptx::slide_list::SlideList;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Directories whose relationship parts point at slides by part name.
const SLIDE_LINK_OWNERS: [&str; 2] = [part_name::SLIDES_DIR, part_name::NOTES_SLIDES_DIR];

/// Where a new slide's relationships come from.
#[derive(Debug, Clone)]
pub enum SlideRelationships {
    /// A layout and a theme reference with fresh ids
    Fresh { layout: String, theme: String },
    /// Copies of another slide's relationships
    CopyFrom { source: Relationships, force_new_ids: bool },
}

/// Content and relationships of a slide about to be inserted.
#[derive(Debug, Clone)]
pub struct NewSlide {
    pub content: XmlDocument,
    pub relationships: SlideRelationships,
}

/// What an insertion did.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    /// Physical index of the new slide
    pub position: u32,
    pub slide_count: u32,
    pub regeneration: Regeneration,
    /// Old → new relationship ids when relationships were copied
    pub relationship_map: BTreeMap<RelationshipId, RelationshipId>,
    /// Numeric id of the new slide list entry
    pub slide_list_id: u32,
    /// Presentation relationship pointing at the new slide
    pub presentation_rel: RelationshipId,
}

/// Runs structural slide operations against one package.
pub struct Cascade<'a> {
    dir: &'a PackageDir,
    shapes: &'a ShapeRegistry,
    relationships: &'a RelationshipRegistry,
}

impl<'a> Cascade<'a> {
    pub fn new(dir: &'a PackageDir, shapes: &'a ShapeRegistry, relationships: &'a RelationshipRegistry) -> Self {
        Self {
            dir,
            shapes,
            relationships,
        }
    }

    /// Number of slides, checking that the slide files are contiguous.
    ///
    /// # Errors
    /// [`Error::Structural`] if a slide file is missing from the sequence.
    pub fn slide_count(&self) -> Result<u32> {
        let indices = self.dir.slide_indices()?;
        for (expected, actual) in (1u32..).zip(&indices) {
            if expected != *actual {
                return Err(Error::Structural(format!(
                    "slide files are not contiguous: expected slide{}.xml, found slide{}.xml",
                    expected, actual
                )));
            }
        }
        Ok(indices.len() as u32)
    }

    fn load_manifest(&self) -> Result<(PackURI, ContentTypes)> {
        let uri = PackURI::new(part_name::CONTENT_TYPES)?;
        let doc = self
            .dir
            .read_xml_opt(&uri)?
            .ok_or_else(|| Error::Structural("content types manifest is missing".to_string()))?;
        Ok((uri, ContentTypes::from_document(doc)))
    }

    /// Insert a slide at physical index `position` (1-based).
    ///
    /// # Errors
    /// - [`Error::NotFound`] if `position` is outside `1..=count + 1`
    /// - [`Error::Structural`] if slides are not contiguous, or the
    ///   presentation part, slide list or manifest is missing
    /// - [`Error::Io`] for filesystem failures, which may leave the package
    ///   partly renumbered
    pub fn insert_slide(&self, position: u32, new_slide: NewSlide) -> Result<InsertOutcome> {
        let count = self.slide_count()?;
        if position == 0 || position > count + 1 {
            return Err(Error::NotFound(format!(
                "slide position {} (package has {} slides)",
                position, count
            )));
        }
        let mut list = SlideList::load(self.dir)?;
        if !list.has_list() && count > 0 {
            return Err(Error::Structural(
                "presentation has slides but no slide list".to_string(),
            ));
        }
        let (manifest_uri, mut manifest) = self.load_manifest()?;

        self.make_room(position, count)?;

        let NewSlide {
            mut content,
            mut relationships,
        } = new_slide;
        // Copied links were read before the renumbering
        if let SlideRelationships::CopyFrom { source, .. } = &mut relationships {
            if position <= count {
                shift_slide_targets(source, position, 1);
            }
        }
        let regeneration = regenerate_shape_ids(&mut content, position, self.shapes)?;
        let (rels, relationship_map) = match relationships {
            SlideRelationships::Fresh { layout, theme } => (
                self.relationships
                    .create_slide_relationships(position, &layout, &theme)?,
                BTreeMap::new(),
            ),
            SlideRelationships::CopyFrom {
                source,
                force_new_ids,
            } => {
                let (rels, mapping) =
                    self.relationships
                        .copy_slide_relationships(&source, position, force_new_ids)?;
                let remapped = remap_relationship_refs(&mut content, &mapping);
                debug!("Remapped {} relationship references in copied content", remapped);
                (rels, mapping)
            },
        };
        self.dir.write_xml(&PackURI::slide(position), &content)?;
        self.dir.write_rels(&rels)?;
        debug!("Materialized slide {}", position);

        list.shift_from(position, 1);
        let presentation_rel = self.relationships.allocate_unique()?;
        list.add_slide_relationship(presentation_rel.clone(), position);
        let slide_list_id = list.insert_entry(position, &presentation_rel)?;
        list.save(self.dir)?;
        self.relationships.register(
            presentation_rel.clone(),
            RelationshipInfo {
                reltype: relationship_type::SLIDE.to_string(),
                target: PackURI::slide(position).relative_ref(list.relationships().source().base_uri()),
                source: list.relationships().source().clone(),
                external: false,
            },
        );

        let mut declared = 0;
        for index in 1..=count + 1 {
            if manifest.ensure_override(&PackURI::slide(index), content_type::PML_SLIDE) {
                declared += 1;
            }
        }
        if manifest.ensure_default("rels", content_type::OPC_RELATIONSHIPS) {
            declared += 1;
        }
        if declared > 0 {
            self.dir.write_xml(&manifest_uri, manifest.document())?;
        }

        info!("Inserted slide at position {} ({} slides)", position, count + 1);
        Ok(InsertOutcome {
            position,
            slide_count: count + 1,
            regeneration,
            relationship_map,
            slide_list_id,
            presentation_rel,
        })
    }

    /// Rename slides `position..=count` up by one, highest first.
    fn make_room(&self, position: u32, count: u32) -> Result<()> {
        for index in (position..=count).rev() {
            let from = PackURI::slide(index);
            let to = PackURI::slide(index + 1);
            self.dir.rename(&from, &to)?;
            self.dir.rename_if_exists(&from.rels_uri(), &to.rels_uri())?;
            debug!("Moved slide {} -> {}", index, index + 1);
        }
        if position <= count {
            self.shapes.shift_slides(position, 1);
            self.relationships.rescope_slides(position, 1);
            self.retarget_slide_links(position, 1)?;
        }
        Ok(())
    }

    /// Remove the slide at physical index `index` and close the gap.
    ///
    /// Both registries are rebuilt from disk afterwards.
    ///
    /// # Returns
    /// The new slide count.
    pub fn remove_slide(&self, index: u32) -> Result<u32> {
        let count = self.slide_count()?;
        if index == 0 || index > count {
            return Err(Error::NotFound(format!(
                "slide {} (package has {} slides)",
                index, count
            )));
        }
        let mut list = SlideList::load(self.dir)?;
        let (manifest_uri, mut manifest) = self.load_manifest()?;

        let removed = PackURI::slide(index);
        let notes = self.owned_notes(&removed)?;
        self.dir.remove(&removed)?;
        self.dir.remove(&removed.rels_uri())?;
        let mut manifest_changed = false;
        for part in &notes {
            self.dir.remove(part)?;
            self.dir.remove(&part.rels_uri())?;
            manifest_changed |= manifest.remove_override(part);
            debug!("Removed notes part {} owned by slide {}", part, index);
        }
        for moving in index + 1..=count {
            let from = PackURI::slide(moving);
            let to = PackURI::slide(moving - 1);
            self.dir.rename(&from, &to)?;
            self.dir.rename_if_exists(&from.rels_uri(), &to.rels_uri())?;
            debug!("Moved slide {} -> {}", moving, moving - 1);
        }

        if list.remove_entry_for(index).is_none() {
            debug!("Slide {} had no slide list entry", index);
        }
        list.shift_from(index + 1, -1);
        list.save(self.dir)?;
        self.retarget_slide_links(index + 1, -1)?;

        manifest_changed |= manifest.remove_override(&PackURI::slide(count));
        if manifest_changed {
            self.dir.write_xml(&manifest_uri, manifest.document())?;
        }

        self.shapes.rescan(self.dir)?;
        self.relationships.rescan(self.dir)?;
        info!("Removed slide {} ({} slides left)", index, count - 1);
        Ok(count - 1)
    }

    /// Notes parts a slide points at.
    fn owned_notes(&self, slide: &PackURI) -> Result<Vec<PackURI>> {
        let rels = self.dir.read_rels(slide)?;
        Ok(rels
            .iter()
            .filter(|rel| rel.reltype() == relationship_type::NOTES_SLIDE && !rel.is_external())
            .filter_map(|rel| rels.target_partname(rel).ok())
            .collect())
    }

    /// Retarget references to slides at or after `from` in every slide and
    /// notes slide relationship part after a renumbering.
    fn retarget_slide_links(&self, from: u32, delta: i32) -> Result<()> {
        for owner in SLIDE_LINK_OWNERS {
            for rels_uri in self.dir.rels_parts_in(owner)? {
                let Some(source) = rels_uri.rels_source() else {
                    continue;
                };
                let mut rels = self.dir.read_rels(&source)?;
                if shift_slide_targets(&mut rels, from, delta) {
                    self.dir.write_rels(&rels)?;
                    debug!("Retargeted slide links in {}", rels_uri);
                }
            }
        }
        Ok(())
    }
}

/// Shift internal slide targets at or after `from` by `delta`. Returns
/// whether anything changed.
fn shift_slide_targets(rels: &mut Relationships, from: u32, delta: i32) -> bool {
    let base = rels.source().base_uri().to_string();
    let mut changed = false;
    for rel in rels.iter_mut() {
        if rel.reltype() != relationship_type::SLIDE || rel.is_external() {
            continue;
        }
        let Ok(target) = PackURI::from_rel_ref(&base, rel.target_ref()) else {
            continue;
        };
        if let Some(index) = target.idx().filter(|i| target.is_slide() && *i >= from) {
            rel.set_target_ref(PackURI::slide(index.saturating_add_signed(delta)).relative_ref(&base));
            changed = true;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EditorConfig;
    use crate::common::xml::XmlElement;
    use crate::ooxml::opc::Relationship;
    use crate::ooxml::pptx::slide::{SlideContent, blank_slide_with_title};
    use crate::ooxml::pptx::testutil::PackageFixture;

    struct Harness {
        _fixture: PackageFixture,
        dir: PackageDir,
        shapes: ShapeRegistry,
        relationships: RelationshipRegistry,
    }

    impl Harness {
        fn new(slides: u32) -> Self {
            let fixture = PackageFixture::with_slides(slides);
            let dir = fixture.dir();
            let shapes = ShapeRegistry::scan(&dir).unwrap();
            let relationships =
                RelationshipRegistry::scan(&dir, EditorConfig::default().transient_reltype_markers).unwrap();
            Self {
                _fixture: fixture,
                dir,
                shapes,
                relationships,
            }
        }

        fn cascade(&self) -> Cascade<'_> {
            Cascade::new(&self.dir, &self.shapes, &self.relationships)
        }

        fn insert_titled(&self, position: u32, title: &str) -> InsertOutcome {
            let config = EditorConfig::default();
            self.cascade()
                .insert_slide(
                    position,
                    NewSlide {
                        content: blank_slide_with_title(Some(title)),
                        relationships: SlideRelationships::Fresh {
                            layout: config.default_layout_target,
                            theme: config.default_theme_target,
                        },
                    },
                )
                .unwrap()
        }

        fn titles_in_order(&self) -> Vec<String> {
            let list = SlideList::load(&self.dir).unwrap();
            list.slide_order()
                .into_iter()
                .map(|index| {
                    let doc = self.dir.read_xml(&PackURI::slide(index.unwrap())).unwrap();
                    SlideContent::from_document(0, &doc)
                        .title()
                        .unwrap_or_default()
                        .to_string()
                })
                .collect()
        }
    }

    #[test]
    fn first_slide_into_empty_package() {
        let h = Harness::new(0);
        let outcome = h.insert_titled(1, "First");
        assert_eq!(outcome.slide_count, 1);
        assert_eq!(h.dir.slide_indices().unwrap(), vec![1]);

        let rels = h.dir.read_rels(&PackURI::slide(1)).unwrap();
        assert_eq!(rels.len(), 2);
        assert!(rels.first_of_type(relationship_type::SLIDE_LAYOUT).is_some());
        assert!(rels.first_of_type(relationship_type::THEME).is_some());
        assert_eq!(SlideList::load(&h.dir).unwrap().len(), 1);

        let manifest = h.dir.read_xml(&PackURI::new(part_name::CONTENT_TYPES).unwrap()).unwrap();
        assert!(ContentTypes::from_document(manifest).has_override(&PackURI::slide(1)));
    }

    #[test]
    fn inserting_at_the_front_moves_the_original() {
        let h = Harness::new(0);
        h.insert_titled(1, "Original");
        h.insert_titled(1, "New");
        assert_eq!(h.dir.slide_indices().unwrap(), vec![1, 2]);
        assert_eq!(h.titles_in_order(), vec!["New", "Original"]);
        // Shapes of the moved slide follow it
        let doc = h.dir.read_xml(&PackURI::slide(2)).unwrap();
        for id in SlideContent::from_document(2, &doc).shape_ids() {
            assert_eq!(h.shapes.lookup(id).unwrap().slide, 2);
        }
    }

    #[test]
    fn insert_in_the_middle_keeps_rels_paired() {
        let h = Harness::new(3);
        let before: Vec<_> = (1..=3)
            .map(|i| h.dir.read_rels(&PackURI::slide(i)).unwrap())
            .map(|rels| rels.iter().map(|r| r.id().clone()).collect::<Vec<_>>())
            .collect();
        h.insert_titled(2, "Inserted");

        assert_eq!(h.dir.slide_indices().unwrap(), vec![1, 2, 3, 4]);
        let moved: Vec<_> = h
            .dir
            .read_rels(&PackURI::slide(3))
            .unwrap()
            .iter()
            .map(|r| r.id().clone())
            .collect();
        assert_eq!(moved, before[1]);
        let order = SlideList::load(&h.dir).unwrap().slide_order();
        assert_eq!(order, vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(h.titles_in_order()[1], "Inserted");
    }

    #[test]
    fn out_of_range_position() {
        let h = Harness::new(2);
        let slide = NewSlide {
            content: blank_slide_with_title(None),
            relationships: SlideRelationships::Fresh {
                layout: "../slideLayouts/slideLayout1.xml".to_string(),
                theme: "../theme/theme1.xml".to_string(),
            },
        };
        assert!(matches!(h.cascade().insert_slide(0, slide.clone()), Err(Error::NotFound(_))));
        assert!(matches!(h.cascade().insert_slide(4, slide), Err(Error::NotFound(_))));
        assert_eq!(h.dir.slide_indices().unwrap(), vec![1, 2]);
    }

    #[test]
    fn gaps_are_refused() {
        let h = Harness::new(3);
        h.dir.remove(&PackURI::slide(2)).unwrap();
        assert!(matches!(h.cascade().slide_count(), Err(Error::Structural(_))));
    }

    #[test]
    fn copied_relationships_are_remapped_in_content() {
        let h = Harness::new(1);
        let mut source = h.dir.read_rels(&PackURI::slide(1)).unwrap();
        let image = h
            .relationships
            .add_media_relationship(&mut source, relationship_type::IMAGE, "../media/image1.png")
            .unwrap();
        let mut content = blank_slide_with_title(Some("Pic"));
        content.root_mut().walk_mut(&mut |el: &mut XmlElement| {
            if el.is("spPr") {
                el.set_attr("r:embed", image.as_str());
            }
        });

        let outcome = h
            .cascade()
            .insert_slide(
                2,
                NewSlide {
                    content,
                    relationships: SlideRelationships::CopyFrom {
                        source,
                        force_new_ids: false,
                    },
                },
            )
            .unwrap();
        let new_image = &outcome.relationship_map[&image];
        assert_ne!(new_image, &image);
        let written = h.dir.read_xml(&PackURI::slide(2)).unwrap();
        assert_eq!(written.root().find("spPr").unwrap().attr("r:embed"), Some(new_image.as_str()));
        let rels = h.dir.read_rels(&PackURI::slide(2)).unwrap();
        assert!(rels.get(new_image).is_some());
    }

    #[test]
    fn removal_closes_the_gap() {
        let h = Harness::new(0);
        for title in ["A", "B", "C"] {
            let next = h.cascade().slide_count().unwrap() + 1;
            h.insert_titled(next, title);
        }
        assert_eq!(h.cascade().remove_slide(2).unwrap(), 2);
        assert_eq!(h.dir.slide_indices().unwrap(), vec![1, 2]);
        assert_eq!(h.titles_in_order(), vec!["A", "C"]);
        let manifest = h.dir.read_xml(&PackURI::new(part_name::CONTENT_TYPES).unwrap()).unwrap();
        assert!(!ContentTypes::from_document(manifest).has_override(&PackURI::slide(3)));
        assert!(matches!(h.cascade().remove_slide(3), Err(Error::NotFound(_))));
        assert!(h.shapes.ids_for_slide(3).is_empty());
    }

    #[test]
    fn slide_links_follow_renumbering() {
        let h = Harness::new(2);
        let mut rels = h.dir.read_rels(&PackURI::slide(1)).unwrap();
        rels.push(Relationship::new(RelationshipId::new("rId900"), relationship_type::SLIDE, "slide2.xml"));
        h.dir.write_rels(&rels).unwrap();

        h.insert_titled(2, "Between");
        let rels = h.dir.read_rels(&PackURI::slide(1)).unwrap();
        assert_eq!(rels.get(&RelationshipId::new("rId900")).unwrap().target_ref(), "slide3.xml");
    }

    fn attach_notes(h: &Harness, slide: u32) -> PackURI {
        let notes = PackURI::new(format!("{}/notesSlide{}.xml", part_name::NOTES_SLIDES_DIR, slide)).unwrap();
        let doc = XmlDocument::parse_str(
            r#"<p:notes xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree/></p:cSld></p:notes>"#,
        )
        .unwrap();
        h.dir.write_xml(&notes, &doc).unwrap();

        let mut notes_rels = Relationships::new(notes.clone());
        notes_rels.push(Relationship::new(
            RelationshipId::new(format!("rId{}", 800 + slide)),
            relationship_type::SLIDE,
            format!("../slides/slide{}.xml", slide),
        ));
        h.dir.write_rels(&notes_rels).unwrap();

        let mut slide_rels = h.dir.read_rels(&PackURI::slide(slide)).unwrap();
        slide_rels.push(Relationship::new(
            RelationshipId::new(format!("rId{}", 850 + slide)),
            relationship_type::NOTES_SLIDE,
            format!("../notesSlides/notesSlide{}.xml", slide),
        ));
        h.dir.write_rels(&slide_rels).unwrap();

        let uri = PackURI::new(part_name::CONTENT_TYPES).unwrap();
        let mut manifest = ContentTypes::from_document(h.dir.read_xml(&uri).unwrap());
        manifest.ensure_override(&notes, content_type::PML_NOTES_SLIDE);
        h.dir.write_xml(&uri, manifest.document()).unwrap();
        notes
    }

    fn notes_back_reference(h: &Harness, notes: &PackURI) -> String {
        let rels = h.dir.read_rels(notes).unwrap();
        rels.first_of_type(relationship_type::SLIDE)
            .unwrap()
            .target_ref()
            .to_string()
    }

    #[test]
    fn notes_follow_their_slide_on_insert() {
        let h = Harness::new(2);
        let first = attach_notes(&h, 1);
        let second = attach_notes(&h, 2);
        h.relationships.rescan(&h.dir).unwrap();

        h.insert_titled(1, "Front");
        assert_eq!(notes_back_reference(&h, &first), "../slides/slide2.xml");
        assert_eq!(notes_back_reference(&h, &second), "../slides/slide3.xml");
        // The moved slide still owns its notes part
        let moved = h.dir.read_rels(&PackURI::slide(3)).unwrap();
        assert_eq!(
            moved.first_of_type(relationship_type::NOTES_SLIDE).unwrap().target_ref(),
            "../notesSlides/notesSlide2.xml"
        );
    }

    #[test]
    fn removal_drops_the_owned_notes() {
        let h = Harness::new(3);
        let doomed = attach_notes(&h, 2);
        let kept = attach_notes(&h, 3);
        h.relationships.rescan(&h.dir).unwrap();

        h.cascade().remove_slide(2).unwrap();
        assert!(!h.dir.exists(&doomed));
        assert!(!h.dir.exists(&doomed.rels_uri()));
        assert!(h.dir.exists(&kept));
        assert_eq!(notes_back_reference(&h, &kept), "../slides/slide2.xml");

        let manifest = h.dir.read_xml(&PackURI::new(part_name::CONTENT_TYPES).unwrap()).unwrap();
        let manifest = ContentTypes::from_document(manifest);
        assert!(!manifest.has_override(&doomed));
        assert!(manifest.has_override(&kept));
    }

    #[test]
    fn copied_slide_links_follow_renumbering() {
        let h = Harness::new(3);
        let mut rels = h.dir.read_rels(&PackURI::slide(2)).unwrap();
        rels.push(Relationship::new(RelationshipId::new("rId900"), relationship_type::SLIDE, "slide3.xml"));
        h.dir.write_rels(&rels).unwrap();
        h.relationships.rescan(&h.dir).unwrap();

        let source = h.dir.read_rels(&PackURI::slide(2)).unwrap();
        let content = h.dir.read_xml(&PackURI::slide(2)).unwrap();
        h.cascade()
            .insert_slide(
                1,
                NewSlide {
                    content,
                    relationships: SlideRelationships::CopyFrom {
                        source,
                        force_new_ids: false,
                    },
                },
            )
            .unwrap();

        let link = |index: u32| {
            h.dir
                .read_rels(&PackURI::slide(index))
                .unwrap()
                .first_of_type(relationship_type::SLIDE)
                .unwrap()
                .target_ref()
                .to_string()
        };
        assert_eq!(link(1), "slide4.xml");
        assert_eq!(link(3), "slide4.xml");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn insert_sequences_stay_contiguous(picks in proptest::collection::vec(0u32..1000, 1..8)) {
                let h = Harness::new(0);
                let mut expected: Vec<String> = Vec::new();
                for (n, pick) in picks.iter().enumerate() {
                    let position = pick % (n as u32 + 1) + 1;
                    let title = format!("S{}", n);
                    h.insert_titled(position, &title);
                    expected.insert(position as usize - 1, title);
                }
                let n = picks.len() as u32;
                prop_assert_eq!(h.dir.slide_indices().unwrap(), (1..=n).collect::<Vec<_>>());
                prop_assert_eq!(SlideList::load(&h.dir).unwrap().len(), picks.len());
                prop_assert_eq!(h.titles_in_order(), expected);
            }
        }
    }
}
