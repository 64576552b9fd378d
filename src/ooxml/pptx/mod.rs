//! PresentationML package consistency.
//!
//! Keeps the identifiers and orderings of an extracted `.pptx` package
//! consistent while slides are inserted, copied and removed:
//!
//! - `registry`: package-wide shape id and relationship id registries
//! - `rewrite`: fresh shape ids for copied content, with animation, build and
//!   connector references carried along
//! - `cascade`: slide insertion and removal with file renumbering and slide
//!   list updates
//! - `timing`, `animations`: the click-triggered animation timing tree
//! - `validate`: read-only consistency checks reported as findings
//! - `editor`: [`PackageEditor`], which owns all of the above for one
//!   open package
//!
//! # Example
//!
//! ```rust,no_run
//! use slidesmith::ooxml::pptx::{AnimationEffect, EffectSpec, PackageEditor};
//! use slidesmith::EditorConfig;
//!
//! let editor = PackageEditor::open("deck/", EditorConfig::default())?;
//! let slide = editor.insert_blank_slide(1, Some("Welcome"))?;
//! let title = editor.parse_slide(slide)?.shapes[0].id.unwrap();
//!
//! let trigger = editor.create_click_trigger(slide)?;
//! editor.bind_effect(slide, trigger, &EffectSpec::new(title, AnimationEffect::Fade))?;
//! # Ok::<(), slidesmith::Error>(())
//! ```

pub mod animations;
pub mod cascade;
pub mod editor;
pub mod ids;
pub mod registry;
pub mod rewrite;
pub mod slide;
pub mod slide_list;
pub mod template;
pub mod timing;
pub mod validate;

#[cfg(test)]
pub(crate) mod testutil;

pub use animations::{AnimationBinding, AnimationEffect, EffectSpec, Transition};
pub use cascade::{InsertOutcome, NewSlide, SlideRelationships};
pub use editor::PackageEditor;
pub use ids::{RelationshipId, ShapeId};
pub use registry::{RelationshipInfo, RelationshipRegistry, ShapeInfo, ShapeRegistry};
pub use rewrite::Regeneration;
pub use slide::{ShapeKind, ShapeSummary, SlideContent};
pub use slide_list::{SlideList, SlideListEntry};
pub use template::{SlideTemplate, TemplateData, TitleAndContentTemplate, TitleSlideTemplate};
pub use timing::{Delay, TimingNode, TimingTree};
pub use validate::{Severity, ValidationFinding, ValidationReport};
