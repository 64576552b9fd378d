//! Package-wide relationship id registry.
//!
//! Relationship ids are treated as unique across the package even though a
//! relationship part only needs them unique within itself. New ids are always
//! allocated above every id seen in the package, so an id handed out for one
//! part never appears in another.

use super::{IdRegistry, Scoped};
use crate::common::{Error, Result};
use crate::ooxml::opc::constants::{part_name, relationship_type};
use crate::ooxml::opc::{OpcError, PackURI, PackageDir, Relationship, Relationships};
use crate::ooxml::pptx::ids::RelationshipId;
use crate::ooxml::pptx::validate::ValidationFinding;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// What a registered relationship id refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipInfo {
    pub reltype: String,
    /// Target reference as written in the relationship part
    pub target: String,
    /// Part owning the relationship
    pub source: PackURI,
    pub external: bool,
}

impl RelationshipInfo {
    fn from_relationship(source: &PackURI, rel: &Relationship) -> Self {
        Self {
            reltype: rel.reltype().to_string(),
            target: rel.target_ref().to_string(),
            source: source.clone(),
            external: rel.is_external(),
        }
    }
}

impl Scoped for RelationshipInfo {
    type Scope = PackURI;

    fn scope(&self) -> &PackURI {
        &self.source
    }
}

/// Relationship ids of the package, presentation and slide parts.
#[derive(Debug)]
pub struct RelationshipRegistry {
    ids: IdRegistry<RelationshipId, RelationshipInfo>,
    transient_markers: Vec<String>,
}

impl RelationshipRegistry {
    /// An empty registry. References whose type contains one of
    /// `transient_markers` never share an id.
    pub fn new(transient_markers: Vec<String>) -> Self {
        Self {
            ids: IdRegistry::new(),
            transient_markers,
        }
    }

    /// Build the registry from the package, presentation and slide
    /// relationship parts.
    pub fn scan(dir: &PackageDir, transient_markers: Vec<String>) -> Result<Self> {
        let registry = Self::new(transient_markers);
        registry.rescan(dir)?;
        Ok(registry)
    }

    /// Drop everything and scan again.
    ///
    /// When an id appears in more than one part, the first part scanned owns
    /// the registry entry.
    pub fn rescan(&self, dir: &PackageDir) -> Result<()> {
        self.ids.clear();
        let parts = scanned_parts(dir)
            .map_err(|e| Error::Configuration(format!("Failed to list relationship parts: {}", e)))?;
        let mut total = 0;
        for rels_uri in &parts {
            let rels = load(dir, rels_uri).map_err(|e| {
                Error::Configuration(format!("Failed to scan relationships in {}: {}", rels_uri, e))
            })?;
            for rel in rels.iter() {
                let info = RelationshipInfo::from_relationship(rels.source(), rel);
                if self.ids.register_new(rel.id().clone(), info) {
                    total += 1;
                } else {
                    debug!("Relationship id {} in {} is shadowed by an earlier part", rel.id(), rels_uri);
                }
            }
        }
        info!("Registered {} relationship ids from {} parts", total, parts.len());
        Ok(())
    }

    /// Whether references of this type always get their own id.
    pub fn is_transient(&self, reltype: &str) -> bool {
        self.transient_markers
            .iter()
            .any(|marker| reltype.contains(marker.as_str()))
    }

    pub fn allocate_unique(&self) -> Result<RelationshipId> {
        self.ids.allocate_unique()
    }

    pub fn allocate_batch(&self, count: usize) -> Result<Vec<RelationshipId>> {
        self.ids.allocate_batch(count)
    }

    pub fn register(&self, id: RelationshipId, info: RelationshipInfo) -> Option<RelationshipInfo> {
        self.ids.register(id, info)
    }

    pub fn unregister(&self, id: &RelationshipId) -> Option<RelationshipInfo> {
        self.ids.unregister(id)
    }

    pub fn lookup(&self, id: &RelationshipId) -> Option<RelationshipInfo> {
        self.ids.lookup(id)
    }

    pub fn contains(&self, id: &RelationshipId) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> Vec<RelationshipId> {
        self.ids.ids()
    }

    /// Ids registered against one source part, sorted.
    pub fn ids_for_part(&self, source: &PackURI) -> Vec<RelationshipId> {
        self.ids.ids_for_scope(source)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Allocate and register a fresh id for a reference from `source`.
    fn create(&self, source: &PackURI, reltype: &str, target: &str) -> Result<Relationship> {
        let id = self.allocate_unique()?;
        let rel = Relationship::new(id.clone(), reltype, target);
        self.ids.register(id, RelationshipInfo::from_relationship(source, &rel));
        Ok(rel)
    }

    /// Id for a reference from `source`, reusing a registered id with the
    /// same type and target when the type is not transient.
    ///
    /// Reuse requires the registered owner to live in the same directory as
    /// `source`, so the relative target means the same part.
    ///
    /// # Returns
    /// The id and whether it was newly created.
    pub fn find_or_create(&self, source: &PackURI, reltype: &str, target: &str) -> Result<(RelationshipId, bool)> {
        if !self.is_transient(reltype) {
            let existing = self.ids.entries().into_iter().find(|(_, info)| {
                info.reltype == reltype
                    && info.target == target
                    && info.source.base_uri() == source.base_uri()
            });
            if let Some((id, _)) = existing {
                return Ok((id, false));
            }
        }
        Ok((self.create(source, reltype, target)?.id().clone(), true))
    }

    /// Relationships for a new slide: one layout and one theme reference,
    /// both with fresh ids.
    pub fn create_slide_relationships(
        &self,
        slide: u32,
        layout_target: &str,
        theme_target: &str,
    ) -> Result<Relationships> {
        let source = PackURI::slide(slide);
        let mut rels = Relationships::new(source.clone());
        rels.push(self.create(&source, relationship_type::SLIDE_LAYOUT, layout_target)?);
        rels.push(self.create(&source, relationship_type::THEME, theme_target)?);
        debug!("Created layout and theme relationships for slide {}", slide);
        Ok(rels)
    }

    /// Copy a slide's relationships onto slide `dest_slide`.
    ///
    /// Notes-slide references are dropped, as a notes slide belongs to
    /// exactly one slide. Transient types, and every type when `force_new`
    /// is set, get fresh ids; other references go through
    /// [`find_or_create`](Self::find_or_create).
    ///
    /// # Returns
    /// The new relationships and the old → new id map.
    pub fn copy_slide_relationships(
        &self,
        src: &Relationships,
        dest_slide: u32,
        force_new: bool,
    ) -> Result<(Relationships, BTreeMap<RelationshipId, RelationshipId>)> {
        let dest = PackURI::slide(dest_slide);
        let mut copied = Relationships::new(dest.clone());
        let mut mapping = BTreeMap::new();

        for rel in src.iter() {
            if rel.reltype() == relationship_type::NOTES_SLIDE {
                debug!("Not copying notes relationship {}", rel.id());
                continue;
            }
            let mut new_rel = if force_new || self.is_transient(rel.reltype()) {
                self.create(&dest, rel.reltype(), rel.target_ref())?
            } else {
                let (id, _) = self.find_or_create(&dest, rel.reltype(), rel.target_ref())?;
                let mut reused = rel.clone();
                reused.set_id(id);
                reused
            };
            if copied.get(new_rel.id()).is_some() {
                // Two source records resolved to one reused id
                new_rel = self.create(&dest, rel.reltype(), rel.target_ref())?;
            }
            mapping.insert(rel.id().clone(), new_rel.id().clone());
            copied.push(new_rel);
        }
        Ok((copied, mapping))
    }

    /// Append a media reference to a slide's relationships; always a fresh id.
    pub fn add_media_relationship(
        &self,
        rels: &mut Relationships,
        reltype: &str,
        target: &str,
    ) -> Result<RelationshipId> {
        let rel = self.create(rels.source(), reltype, target)?;
        let id = rel.id().clone();
        rels.push(rel);
        Ok(id)
    }

    /// Remove a relationship from a part's relationships and unregister it.
    ///
    /// The registry entry is only dropped when it belongs to the same part.
    pub fn remove_relationship(&self, rels: &mut Relationships, id: &RelationshipId) -> Option<Relationship> {
        let removed = rels.remove(id)?;
        if self.lookup(id).is_some_and(|info| &info.source == rels.source()) {
            self.unregister(id);
        }
        Some(removed)
    }

    /// Follow a slide renumbering: relationships owned by slide `from` or
    /// later move by `delta`, and presentation references to those slides
    /// are retargeted.
    pub fn rescope_slides(&self, from: u32, delta: i32) {
        let moved = |uri: &PackURI| -> Option<u32> {
            let index = uri.idx().filter(|_| uri.is_slide())?;
            (index >= from).then(|| index.saturating_add_signed(delta))
        };
        self.ids.update_all(|_, info| {
            if let Some(index) = moved(&info.source) {
                info.source = PackURI::slide(index);
            }
            if info.reltype == relationship_type::SLIDE
                && !info.external
                && let Ok(target) = PackURI::from_rel_ref(info.source.base_uri(), &info.target)
                && let Some(index) = moved(&target)
            {
                info.target = PackURI::slide(index).relative_ref(info.source.base_uri());
            }
        });
    }

    /// Forget every id owned by a part.
    pub fn forget_part(&self, source: &PackURI) -> usize {
        self.ids.remove_where(|_, info| &info.source == source)
    }

    /// Compare the registry with the relationship parts on disk.
    ///
    /// Errors: an id repeated within one part, an internal target that does
    /// not exist. Warnings: an id reused across parts for different
    /// references, registry entries missing from disk, disk ids missing from
    /// the registry.
    pub fn validate(&self, dir: &PackageDir) -> Vec<ValidationFinding> {
        let mut findings = Vec::new();
        let parts = match scanned_parts(dir) {
            Ok(parts) => parts,
            Err(e) => {
                findings.push(ValidationFinding::error("part-unreadable", e.to_string()));
                return findings;
            },
        };

        let mut on_disk: BTreeMap<RelationshipId, Vec<RelationshipInfo>> = BTreeMap::new();
        for rels_uri in &parts {
            let rels = match load(dir, rels_uri) {
                Ok(rels) => rels,
                Err(e) => {
                    findings.push(ValidationFinding::error("part-unreadable", e.to_string()));
                    continue;
                },
            };
            let mut seen = HashSet::new();
            for rel in rels.iter() {
                if !seen.insert(rel.id()) {
                    findings.push(ValidationFinding::error(
                        "rel-duplicate-id",
                        format!("{} appears more than once in {}", rel.id(), rels_uri),
                    ));
                }
                if !rel.is_external() {
                    let resolved = rels.target_partname(rel);
                    if !resolved.as_ref().is_ok_and(|target| dir.exists(target)) {
                        findings.push(ValidationFinding::error(
                            "rel-broken-target",
                            format!("{} in {} points at missing {}", rel.id(), rels_uri, rel.target_ref()),
                        ));
                    }
                }
                on_disk
                    .entry(rel.id().clone())
                    .or_default()
                    .push(RelationshipInfo::from_relationship(rels.source(), rel));
            }
        }

        for (id, owners) in &on_disk {
            let first = &owners[0];
            if owners
                .iter()
                .any(|info| info.reltype != first.reltype || info.target != first.target)
            {
                findings.push(ValidationFinding::warning(
                    "rel-id-conflict",
                    format!("{} refers to different targets in {} parts", id, owners.len()),
                ));
            }
            if !self.contains(id) {
                findings.push(ValidationFinding::warning(
                    "rel-unregistered",
                    format!("{} in {} is not registered", id, first.source.rels_uri()),
                ));
            }
        }
        for (id, info) in self.ids.entries() {
            if !on_disk.contains_key(&id) {
                findings.push(ValidationFinding::warning(
                    "rel-stale",
                    format!("registered {} ({}) is not on disk", id, info.source.rels_uri()),
                ));
            }
        }
        findings
    }
}

/// Relationship parts covered by the registry: package, presentation, slides.
fn scanned_parts(dir: &PackageDir) -> std::result::Result<Vec<PackURI>, OpcError> {
    let mut parts = Vec::new();
    for fixed in [part_name::PACKAGE_RELS, part_name::PRESENTATION_RELS] {
        let uri = PackURI::new(fixed)?;
        if dir.exists(&uri) {
            parts.push(uri);
        }
    }
    parts.extend(dir.rels_parts_in(part_name::SLIDES_DIR)?);
    Ok(parts)
}

fn load(dir: &PackageDir, rels_uri: &PackURI) -> std::result::Result<Relationships, OpcError> {
    let source = rels_uri
        .rels_source()
        .ok_or_else(|| OpcError::InvalidPackUri(format!("{} is not a relationship part", rels_uri)))?;
    let doc = dir.read_xml(rels_uri)?;
    Relationships::from_document(source, &doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EditorConfig;
    use crate::ooxml::opc::constants::relationship_type as rt;
    use crate::ooxml::pptx::testutil::PackageFixture;

    fn markers() -> Vec<String> {
        EditorConfig::default().transient_reltype_markers
    }

    fn rid(token: &str) -> RelationshipId {
        RelationshipId::new(token)
    }

    #[test]
    fn scan_covers_package_presentation_and_slides() {
        let fixture = PackageFixture::with_slides(2);
        let registry = RelationshipRegistry::scan(&fixture.dir(), markers()).unwrap();
        // package: rId1; presentation: master, theme, 2 slides; slides: 2 each
        assert!(registry.len() >= 4);
        let slide_ids = registry.ids_for_part(&PackURI::slide(2));
        assert_eq!(slide_ids.len(), 2);
        let fresh = registry.allocate_unique().unwrap();
        assert!(registry.ids().iter().all(|id| id.number() < fresh.number()));
    }

    #[test]
    fn transient_types_never_share_ids() {
        let registry = RelationshipRegistry::new(markers());
        let slide = PackURI::slide(1);
        let (a, created_a) = registry.find_or_create(&slide, rt::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml").unwrap();
        let (b, created_b) = registry.find_or_create(&PackURI::slide(2), rt::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml").unwrap();
        assert!(created_a && !created_b);
        assert_eq!(a, b);

        let (img_a, _) = registry.find_or_create(&slide, rt::IMAGE, "../media/image1.png").unwrap();
        let (img_b, created) = registry.find_or_create(&slide, rt::IMAGE, "../media/image1.png").unwrap();
        assert!(created);
        assert_ne!(img_a, img_b);
    }

    #[test]
    fn new_slide_relationships_are_fresh() {
        let registry = RelationshipRegistry::new(markers());
        registry.register(
            rid("rId7"),
            RelationshipInfo {
                reltype: rt::SLIDE_LAYOUT.to_string(),
                target: "../slideLayouts/slideLayout1.xml".to_string(),
                source: PackURI::slide(1),
                external: false,
            },
        );
        let rels = registry.create_slide_relationships(2, "../slideLayouts/slideLayout1.xml", "../theme/theme1.xml").unwrap();
        let ids: Vec<_> = rels.iter().map(|r| r.id().as_str().to_string()).collect();
        assert_eq!(ids, vec!["rId8", "rId9"]);
        assert_eq!(rels.source(), &PackURI::slide(2));
        assert_eq!(registry.ids_for_part(&PackURI::slide(2)).len(), 2);
    }

    #[test]
    fn copy_remaps_media_and_drops_notes() {
        let registry = RelationshipRegistry::new(markers());
        let mut src = Relationships::new(PackURI::slide(1));
        src.push(Relationship::new(rid("rId1"), rt::SLIDE_LAYOUT, "../slideLayouts/slideLayout2.xml"));
        src.push(Relationship::new(rid("rId2"), rt::IMAGE, "../media/image1.png"));
        src.push(Relationship::new(rid("rId3"), rt::NOTES_SLIDE, "../notesSlides/notesSlide1.xml"));
        src.push(Relationship::new(rid("rId4"), rt::HYPERLINK, "https://example.com"));
        for rel in src.iter() {
            registry.register(rel.id().clone(), RelationshipInfo::from_relationship(src.source(), rel));
        }

        let (copied, mapping) = registry.copy_slide_relationships(&src, 2, false).unwrap();
        assert_eq!(copied.len(), 3);
        assert_eq!(mapping.len(), 3);
        assert!(!mapping.contains_key(&rid("rId3")));
        // Layout reused, image fresh
        assert_eq!(mapping[&rid("rId1")], rid("rId1"));
        assert_ne!(mapping[&rid("rId2")], rid("rId2"));
        assert!(copied.get(&mapping[&rid("rId4")]).unwrap().is_external());

        let (forced, forced_map) = registry.copy_slide_relationships(&src, 3, true).unwrap();
        assert_eq!(forced.len(), 3);
        assert!(forced_map.iter().all(|(old, new)| old != new));
    }

    #[test]
    fn remove_only_unregisters_own_ids() {
        let registry = RelationshipRegistry::new(markers());
        let mut rels = Relationships::new(PackURI::slide(1));
        let id = registry.add_media_relationship(&mut rels, rt::IMAGE, "../media/image9.png").unwrap();
        assert!(registry.contains(&id));
        assert!(registry.remove_relationship(&mut rels, &id).is_some());
        assert!(!registry.contains(&id));
        assert!(registry.remove_relationship(&mut rels, &id).is_none());
    }

    #[test]
    fn rescoping_follows_renames() {
        let registry = RelationshipRegistry::new(markers());
        let presentation = PackURI::new(part_name::PRESENTATION).unwrap();
        registry.register(
            rid("rId5"),
            RelationshipInfo {
                reltype: rt::SLIDE.to_string(),
                target: "slides/slide2.xml".to_string(),
                source: presentation.clone(),
                external: false,
            },
        );
        let rels = registry.create_slide_relationships(2, "../slideLayouts/slideLayout1.xml", "../theme/theme1.xml").unwrap();
        registry.rescope_slides(2, 1);
        assert_eq!(registry.lookup(&rid("rId5")).unwrap().target, "slides/slide3.xml");
        for rel in rels.iter() {
            assert_eq!(registry.lookup(rel.id()).unwrap().source, PackURI::slide(3));
        }
        assert_eq!(registry.forget_part(&PackURI::slide(3)), 2);
    }

    #[test]
    fn validation_flags_broken_targets() {
        let fixture = PackageFixture::with_slides(1);
        let dir = fixture.dir();
        let registry = RelationshipRegistry::scan(&dir, markers()).unwrap();
        assert!(registry.validate(&dir).is_empty());

        let mut rels = dir.read_rels(&PackURI::slide(1)).unwrap();
        rels.push(Relationship::new(rid("rId90"), rt::IMAGE, "../media/missing.png"));
        rels.push(Relationship::new(rid("rId90"), rt::IMAGE, "../media/missing.png"));
        dir.write_rels(&rels).unwrap();

        let findings = registry.validate(&dir);
        let codes: Vec<_> = findings.iter().map(|f| f.code).collect();
        assert!(codes.contains(&"rel-broken-target"));
        assert!(codes.contains(&"rel-duplicate-id"));
        assert!(codes.contains(&"rel-unregistered"));
        assert_eq!(registry.validate(&dir), findings);
    }
}
