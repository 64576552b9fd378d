//! Editing session over one extracted presentation.
//!
//! [`PackageEditor`] owns the package directory and both identifier
//! registries for as long as the package is open. Structural operations
//! (insert, copy, remove) go through it one at a time; the registries are
//! thread-safe, but nothing locks across the multi-step rename sequence, so
//! two editors must never work on the same directory.
//!
//! Operations are not transactional. When one fails part-way, the returned
//! [`Error::Operation`] names it and the package may need to be restored by
//! the caller.

use crate::common::{EditorConfig, Error, Result};
use crate::ooxml::opc::{PackURI, PackageDir, Relationship};
use crate::ooxml::pptx::animations::EffectSpec;
use crate::ooxml::pptx::cascade::{Cascade, InsertOutcome, NewSlide, SlideRelationships};
use crate::ooxml::pptx::ids::{RelationshipId, ShapeId};
use crate::ooxml::pptx::registry::{RelationshipRegistry, ShapeRegistry};
use crate::ooxml::pptx::slide::{self, SlideContent, blank_slide_with_title};
use crate::ooxml::pptx::slide_list::SlideList;
use crate::ooxml::pptx::template::{SlideTemplate, TemplateData};
use crate::ooxml::pptx::timing;
use crate::ooxml::pptx::validate::{ValidationFinding, ValidationReport, check_structure};
use std::path::Path;
use tracing::{info, instrument, warn};

/// An open presentation package.
///
/// # Examples
///
/// ```rust,no_run
/// use slidesmith::{EditorConfig, PackageEditor};
///
/// let editor = PackageEditor::open("deck/", EditorConfig::default())?;
/// let index = editor.insert_blank_slide(1, Some("Agenda"))?;
/// let copy = editor.insert_copied_slide(index + 1, index, Some("Agenda (cont.)"))?;
/// println!("{} shapes renumbered", copy.regeneration.shapes_processed);
///
/// let report = editor.validate();
/// assert!(report.is_valid(), "{}", report);
/// # Ok::<(), slidesmith::Error>(())
/// ```
#[derive(Debug)]
pub struct PackageEditor {
    dir: PackageDir,
    shapes: ShapeRegistry,
    relationships: RelationshipRegistry,
    config: EditorConfig,
}

fn wrap<T>(operation: &str, result: Result<T>) -> Result<T> {
    result.map_err(|e| Error::operation(operation, e))
}

impl PackageEditor {
    /// Open an extracted package and scan both registries.
    ///
    /// # Errors
    /// - [`Error::NotFound`] if `root` is not a directory
    /// - [`Error::Configuration`] if a slide or relationship part cannot be
    ///   parsed while building the registries
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(root: P, config: EditorConfig) -> Result<Self> {
        let dir = PackageDir::open(root.as_ref())?;
        let shapes = ShapeRegistry::scan(&dir)?;
        let relationships = RelationshipRegistry::scan(&dir, config.transient_reltype_markers.clone())?;
        info!(
            "Opened package: {} shape ids, {} relationship ids",
            shapes.len(),
            relationships.len()
        );
        Ok(Self {
            dir,
            shapes,
            relationships,
            config,
        })
    }

    /// Extract a `.pptx` archive into `workdir` and open the result.
    #[cfg(feature = "archive")]
    pub fn open_archive<P: AsRef<Path>, Q: AsRef<Path>>(
        archive: P,
        workdir: Q,
        config: EditorConfig,
    ) -> Result<Self> {
        crate::ooxml::opc::archive::extract_package(archive, workdir.as_ref())?;
        Self::open(workdir, config)
    }

    /// Compress the package into a `.pptx` archive.
    ///
    /// With `require_valid_before_save` set, a package whose validation
    /// reports errors is not written.
    ///
    /// # Returns
    /// The number of parts stored.
    #[cfg(feature = "archive")]
    #[instrument(skip_all, fields(archive = %archive.as_ref().display()))]
    pub fn save_archive<P: AsRef<Path>>(&self, archive: P) -> Result<usize> {
        if self.config.require_valid_before_save {
            let report = self.validate();
            if !report.is_valid() {
                return Err(Error::Structural(format!(
                    "package has {} validation errors; not saving\n{}",
                    report.errors.len(),
                    report
                )));
            }
        }
        Ok(crate::ooxml::opc::archive::compress_package(self.dir.root(), archive)?)
    }

    #[inline]
    pub fn dir(&self) -> &PackageDir {
        &self.dir
    }

    #[inline]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    #[inline]
    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    #[inline]
    pub fn relationships(&self) -> &RelationshipRegistry {
        &self.relationships
    }

    fn cascade(&self) -> Cascade<'_> {
        Cascade::new(&self.dir, &self.shapes, &self.relationships)
    }

    pub fn slide_count(&self) -> Result<u32> {
        self.cascade().slide_count()
    }

    /// Physical slide indices in presentation order. Entries that do not
    /// resolve to a slide are skipped.
    pub fn slide_order(&self) -> Result<Vec<u32>> {
        Ok(SlideList::load(&self.dir)?
            .slide_order()
            .into_iter()
            .flatten()
            .collect())
    }

    fn require_slide(&self, index: u32) -> Result<PackURI> {
        let uri = PackURI::slide(index);
        if !self.dir.exists(&uri) {
            return Err(Error::NotFound(format!("slide {}", index)));
        }
        Ok(uri)
    }

    /// Parsed view of the slide at a physical index.
    pub fn parse_slide(&self, index: u32) -> Result<SlideContent> {
        let uri = self.require_slide(index)?;
        let doc = self.dir.read_xml(&uri)?;
        Ok(SlideContent::from_document(index, &doc))
    }

    /// Insert a blank slide, optionally with a title placeholder.
    ///
    /// # Returns
    /// The physical index of the new slide.
    #[instrument(skip(self))]
    pub fn insert_blank_slide(&self, position: u32, title: Option<&str>) -> Result<u32> {
        let slide = NewSlide {
            content: blank_slide_with_title(title),
            relationships: self.fresh_relationships(None),
        };
        let outcome = wrap("insert_blank_slide", self.cascade().insert_slide(position, slide))?;
        Ok(outcome.position)
    }

    /// Insert a copy of the slide currently at `source`.
    ///
    /// Every shape of the copy gets a fresh id, animation and build
    /// references follow their shapes, and relationship references in the
    /// content are rewritten to the copied relationship ids. With `title`,
    /// the copy's title placeholder gets that text.
    #[instrument(skip(self))]
    pub fn insert_copied_slide(&self, position: u32, source: u32, title: Option<&str>) -> Result<InsertOutcome> {
        wrap("insert_copied_slide", self.copy_slide(position, source, title))
    }

    fn copy_slide(&self, position: u32, source: u32, title: Option<&str>) -> Result<InsertOutcome> {
        let uri = self.require_slide(source)?;
        let mut content = self.dir.read_xml(&uri)?;
        if let Some(title) = title {
            if !slide::set_title(&mut content, title) {
                warn!("Slide {} has no title placeholder; copy keeps its text", source);
            }
        }
        let rels = self.dir.read_rels(&uri)?;
        let outcome = self.cascade().insert_slide(
            position,
            NewSlide {
                content,
                relationships: SlideRelationships::CopyFrom {
                    source: rels,
                    force_new_ids: false,
                },
            },
        )?;
        info!(
            "Copied slide {} to {}: {} shapes, {} references",
            source, outcome.position, outcome.regeneration.shapes_processed, outcome.regeneration.references_updated
        );
        Ok(outcome)
    }

    /// Insert a slide built from a template.
    #[instrument(skip(self, template, data), fields(template = template.name()))]
    pub fn insert_template_slide(
        &self,
        position: u32,
        template: &dyn SlideTemplate,
        data: &TemplateData,
    ) -> Result<InsertOutcome> {
        let result = template.build(data).and_then(|content| {
            self.cascade().insert_slide(
                position,
                NewSlide {
                    content,
                    relationships: self.fresh_relationships(template.layout_target()),
                },
            )
        });
        wrap("insert_template_slide", result)
    }

    fn fresh_relationships(&self, layout: Option<&str>) -> SlideRelationships {
        SlideRelationships::Fresh {
            layout: layout
                .unwrap_or(&self.config.default_layout_target)
                .to_string(),
            theme: self.config.default_theme_target.clone(),
        }
    }

    /// Remove the slide at a physical index.
    ///
    /// # Returns
    /// The new slide count.
    #[instrument(skip(self))]
    pub fn remove_slide(&self, index: u32) -> Result<u32> {
        wrap("remove_slide", self.cascade().remove_slide(index))
    }

    /// Add a media or image reference to a slide; the id is always fresh.
    #[instrument(skip(self))]
    pub fn add_media_relationship(&self, slide: u32, reltype: &str, target: &str) -> Result<RelationshipId> {
        let result = self.require_slide(slide).and_then(|uri| {
            let mut rels = self.dir.read_rels(&uri)?;
            let id = self
                .relationships
                .add_media_relationship(&mut rels, reltype, target)?;
            self.dir.write_rels(&rels)?;
            Ok(id)
        });
        wrap("add_media_relationship", result)
    }

    /// Remove a relationship from a slide and unregister its id.
    #[instrument(skip(self, id), fields(id = %id))]
    pub fn remove_relationship(&self, slide: u32, id: &RelationshipId) -> Result<Relationship> {
        let result = self.require_slide(slide).and_then(|uri| {
            let mut rels = self.dir.read_rels(&uri)?;
            let removed = self
                .relationships
                .remove_relationship(&mut rels, id)
                .ok_or_else(|| Error::NotFound(format!("relationship {} on slide {}", id, slide)))?;
            self.dir.write_rels(&rels)?;
            Ok(removed)
        });
        wrap("remove_relationship", result)
    }

    /// Append a click trigger to a slide's main sequence.
    ///
    /// # Returns
    /// The trigger's 1-based ordinal.
    #[instrument(skip(self))]
    pub fn create_click_trigger(&self, slide: u32) -> Result<usize> {
        let result = self.require_slide(slide).and_then(|uri| {
            let mut doc = self.dir.read_xml(&uri)?;
            let ordinal = timing::create_click_trigger(&mut doc)?;
            self.dir.write_xml(&uri, &doc)?;
            Ok(ordinal)
        });
        wrap("create_click_trigger", result)
    }

    /// Append an effect under a click trigger of a slide.
    ///
    /// # Errors
    /// [`Error::NotFound`] (wrapped) if the slide, the trigger or the target
    /// shape does not exist.
    ///
    /// # Returns
    /// The time node id of the new effect.
    #[instrument(skip(self, spec), fields(target = %spec.target))]
    pub fn bind_effect(&self, slide: u32, trigger: usize, spec: &EffectSpec) -> Result<u32> {
        let result = self.require_slide(slide).and_then(|uri| {
            let mut doc = self.dir.read_xml(&uri)?;
            let content = SlideContent::from_document(slide, &doc);
            if !content.shape_ids().contains(&spec.target) {
                return Err(Error::NotFound(format!("shape {} on slide {}", spec.target, slide)));
            }
            let id = timing::bind_effect(&mut doc, trigger, spec, self.config.default_effect_duration_ms)?;
            self.dir.write_xml(&uri, &doc)?;
            Ok(id)
        });
        wrap("bind_effect", result)
    }

    /// Look up the slide a shape id is registered under.
    pub fn slide_of_shape(&self, id: ShapeId) -> Option<u32> {
        self.shapes.lookup(id).map(|info| info.slide)
    }

    /// Rebuild both registries from disk.
    pub fn rescan(&self) -> Result<()> {
        self.shapes.rescan(&self.dir)?;
        self.relationships.rescan(&self.dir)
    }

    /// Check the package without modifying it.
    ///
    /// Covers shape id uniqueness, relationship targets, slide file and slide
    /// list consistency, and the animation timing of every slide. Running it
    /// twice without a mutation in between gives the same report.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::from_findings(self.shapes.validate(&self.dir));
        report.extend(self.relationships.validate(&self.dir));
        match check_structure(&self.dir) {
            Ok(findings) => report.extend(findings),
            Err(e) => report.extend([ValidationFinding::error("part-unreadable", e.to_string())]),
        }
        report.extend(self.timing_findings());
        if !report.is_valid() {
            warn!("Validation found {} errors", report.errors.len());
        }
        report
    }

    fn timing_findings(&self) -> Vec<ValidationFinding> {
        let mut findings = Vec::new();
        let Ok(indices) = self.dir.slide_indices() else {
            return findings;
        };
        for index in indices {
            // Unreadable slides are reported by the shape registry
            let Ok(doc) = self.dir.read_xml(&PackURI::slide(index)) else {
                continue;
            };
            for (node, message) in timing::trigger_delay_violations(doc.root()) {
                let node = node.map_or_else(|| "?".to_string(), |id| id.to_string());
                findings.push(ValidationFinding::error(
                    "timing-trigger-delay",
                    format!("slide {} time node {}: {}", index, node, message),
                ));
            }
            let content = SlideContent::from_document(index, &doc);
            let shape_ids = content.shape_ids();
            for binding in &content.bindings {
                if !shape_ids.contains(&binding.target) {
                    findings.push(ValidationFinding::warning(
                        "animation-dangling-target",
                        format!(
                            "slide {}: effect targets shape {} which is not on the slide",
                            index, binding.target
                        ),
                    ));
                }
            }
        }
        findings
    }
}
