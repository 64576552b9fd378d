//! Package-wide shape id registry.

use super::{IdRegistry, Scoped};
use crate::common::xml::XmlDocument;
use crate::common::{Error, Result};
use crate::ooxml::opc::{PackURI, PackageDir};
use crate::ooxml::pptx::ids::ShapeId;
use crate::ooxml::pptx::slide;
use crate::ooxml::pptx::validate::ValidationFinding;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Owner of a registered shape id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeInfo {
    /// Physical index of the slide holding the shape
    pub slide: u32,
    pub name: String,
}

impl Scoped for ShapeInfo {
    type Scope = u32;

    fn scope(&self) -> &u32 {
        &self.slide
    }
}

/// Shape ids of every slide in a package.
#[derive(Debug, Default)]
pub struct ShapeRegistry {
    ids: IdRegistry<ShapeId, ShapeInfo>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from every slide part of the package.
    ///
    /// Malformed id tokens are skipped. A slide part that cannot be read or
    /// parsed fails the scan with [`Error::Configuration`].
    pub fn scan(dir: &PackageDir) -> Result<Self> {
        let registry = Self::new();
        registry.rescan(dir)?;
        Ok(registry)
    }

    /// Drop everything and scan again.
    pub fn rescan(&self, dir: &PackageDir) -> Result<()> {
        self.ids.clear();
        let indices = dir
            .slide_indices()
            .map_err(|e| Error::Configuration(format!("Failed to list slides: {}", e)))?;
        let mut total = 0;
        for index in &indices {
            let doc = dir.read_xml(&PackURI::slide(*index)).map_err(|e| {
                Error::Configuration(format!("Failed to scan shapes of slide {}: {}", index, e))
            })?;
            total += self.scan_slide(*index, &doc);
        }
        info!("Registered {} shape ids across {} slides", total, indices.len());
        Ok(())
    }

    /// Register the shapes of one slide. Returns how many ids were added.
    ///
    /// The first owner of a duplicated id keeps it.
    pub fn scan_slide(&self, index: u32, doc: &XmlDocument) -> usize {
        let mut added = 0;
        for (token, name) in slide::identity_tokens(doc.root()) {
            let Some(id) = ShapeId::parse(&token) else {
                debug!("Skipping malformed shape id '{}' on slide {}", token, index);
                continue;
            };
            if self.ids.register_new(id, ShapeInfo { slide: index, name }) {
                added += 1;
            } else {
                debug!("Shape id {} on slide {} is already registered", id, index);
            }
        }
        added
    }

    /// Smallest unregistered id above the running maximum.
    pub fn allocate_unique(&self) -> Result<ShapeId> {
        self.ids.allocate_unique()
    }

    pub fn allocate_batch(&self, count: usize) -> Result<Vec<ShapeId>> {
        self.ids.allocate_batch(count)
    }

    pub fn register(&self, id: ShapeId, info: ShapeInfo) -> Option<ShapeInfo> {
        self.ids.register(id, info)
    }

    pub fn unregister(&self, id: ShapeId) -> Option<ShapeInfo> {
        self.ids.unregister(&id)
    }

    pub fn lookup(&self, id: ShapeId) -> Option<ShapeInfo> {
        self.ids.lookup(&id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> Vec<ShapeId> {
        self.ids.ids()
    }

    /// Ids owned by one slide, sorted.
    pub fn ids_for_slide(&self, slide: u32) -> Vec<ShapeId> {
        self.ids.ids_for_scope(&slide)
    }

    pub fn max_id(&self) -> u32 {
        self.ids.max_ordinal()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Move every shape owned by slide `from` or later by `delta` slides.
    pub fn shift_slides(&self, from: u32, delta: i32) {
        self.ids.update_all(|_, info| {
            if info.slide >= from {
                info.slide = info.slide.saturating_add_signed(delta);
            }
        });
    }

    /// Forget every id owned by a slide.
    pub fn remove_slide(&self, slide: u32) -> usize {
        self.ids.remove_where(|_, info| info.slide == slide)
    }

    /// Compare the registry with the slides on disk.
    ///
    /// Duplicate ids anywhere in the package are errors; registry entries
    /// without a shape on disk, shapes missing from the registry and owner
    /// mismatches are warnings.
    pub fn validate(&self, dir: &PackageDir) -> Vec<ValidationFinding> {
        let mut findings = Vec::new();
        let indices = match dir.slide_indices() {
            Ok(indices) => indices,
            Err(e) => {
                findings.push(ValidationFinding::error("part-unreadable", e.to_string()));
                return findings;
            },
        };

        let mut on_disk: BTreeMap<ShapeId, Vec<u32>> = BTreeMap::new();
        for index in indices {
            let doc = match dir.read_xml(&PackURI::slide(index)) {
                Ok(doc) => doc,
                Err(e) => {
                    findings.push(ValidationFinding::error("part-unreadable", e.to_string()));
                    continue;
                },
            };
            for (token, _) in slide::identity_tokens(doc.root()) {
                match ShapeId::parse(&token) {
                    Some(id) => on_disk.entry(id).or_default().push(index),
                    None => findings.push(ValidationFinding::warning(
                        "shape-malformed-id",
                        format!("slide {} has a shape with id '{}'", index, token),
                    )),
                }
            }
        }

        for (id, slides) in &on_disk {
            if slides.len() > 1 {
                let owners: Vec<String> = slides.iter().map(u32::to_string).collect();
                findings.push(ValidationFinding::error(
                    "shape-duplicate-id",
                    format!("shape id {} is used {} times (slides {})", id, slides.len(), owners.join(", ")),
                ));
            }
            match self.lookup(*id) {
                None => findings.push(ValidationFinding::warning(
                    "shape-unregistered",
                    format!("shape id {} on slide {} is not registered", id, slides[0]),
                )),
                Some(info) if !slides.contains(&info.slide) => {
                    findings.push(ValidationFinding::warning(
                        "shape-owner-mismatch",
                        format!("shape id {} is registered to slide {} but found on slide {}", id, info.slide, slides[0]),
                    ))
                },
                Some(_) => {},
            }
        }
        for (id, info) in self.ids.entries() {
            if !on_disk.contains_key(&id) {
                findings.push(ValidationFinding::warning(
                    "shape-stale",
                    format!("registered shape id {} (slide {}) is not on disk", id, info.slide),
                ));
            }
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::pptx::testutil::{PackageFixture, slide_with_shapes};

    fn shape(n: u32) -> ShapeId {
        ShapeId::new(n).unwrap()
    }

    #[test]
    fn scan_registers_every_slide() {
        let fixture = PackageFixture::empty();
        fixture.write_slide(1, &slide_with_shapes(&["2", "3"]));
        fixture.write_slide(2, &slide_with_shapes(&["4", "x9", "7"]));
        let registry = ShapeRegistry::scan(&fixture.dir()).unwrap();

        assert_eq!(registry.len(), 4);
        assert_eq!(registry.ids_for_slide(2), vec![shape(4), shape(7)]);
        assert_eq!(registry.lookup(shape(3)).unwrap().slide, 1);
        // The malformed token does not raise the maximum
        assert_eq!(registry.max_id(), 7);
        assert_eq!(registry.allocate_unique().unwrap(), shape(8));
    }

    #[test]
    fn scan_fails_on_unparseable_slide() {
        let fixture = PackageFixture::empty();
        fixture
            .dir()
            .write_bytes(&PackURI::slide(1), b"<p:sld><p:cSld></p:sld>")
            .unwrap();
        assert!(matches!(
            ShapeRegistry::scan(&fixture.dir()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn shifting_and_removing_slides() {
        let fixture = PackageFixture::empty();
        fixture.write_slide(1, &slide_with_shapes(&["2"]));
        fixture.write_slide(2, &slide_with_shapes(&["3"]));
        fixture.write_slide(3, &slide_with_shapes(&["4"]));
        let registry = ShapeRegistry::scan(&fixture.dir()).unwrap();

        registry.shift_slides(2, 1);
        assert_eq!(registry.lookup(shape(2)).unwrap().slide, 1);
        assert_eq!(registry.lookup(shape(3)).unwrap().slide, 3);
        assert_eq!(registry.lookup(shape(4)).unwrap().slide, 4);

        assert_eq!(registry.remove_slide(3), 1);
        assert!(!registry.contains(shape(3)));
    }

    #[test]
    fn validation_reports_duplicates_and_drift() {
        let fixture = PackageFixture::empty();
        fixture.write_slide(1, &slide_with_shapes(&["2", "3"]));
        fixture.write_slide(2, &slide_with_shapes(&["3", "5"]));
        let dir = fixture.dir();
        let registry = ShapeRegistry::scan(&dir).unwrap();
        registry.register(
            shape(40),
            ShapeInfo {
                slide: 1,
                name: "ghost".to_string(),
            },
        );

        let findings = registry.validate(&dir);
        let codes: Vec<_> = findings.iter().map(|f| f.code).collect();
        assert!(codes.contains(&"shape-duplicate-id"));
        assert!(codes.contains(&"shape-stale"));
        assert!(!codes.contains(&"shape-unregistered"));

        // Read-only and repeatable
        assert_eq!(registry.validate(&dir), findings);
    }
}
