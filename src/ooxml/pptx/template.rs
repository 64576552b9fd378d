//! Slide templates.
//!
//! A template turns a bag of named strings into slide content. Shape ids in
//! template output are placeholders; the editor regenerates them before the
//! slide is written, so templates never need to know what ids are taken.

use crate::common::Result;
use crate::common::xml::XmlDocument;
use crate::ooxml::pptx::ids::ShapeId;
use crate::ooxml::pptx::slide::{blank_slide_document, placeholder_shape, shape_tree_mut};
use std::collections::BTreeMap;

/// Named values used to fill a template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateData {
    values: BTreeMap<String, String>,
}

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// A value split into lines; empty when the key is absent.
    pub fn lines(&self, key: &str) -> Vec<&str> {
        self.get(key).map(|v| v.lines().collect()).unwrap_or_default()
    }
}

/// Source of slide content.
pub trait SlideTemplate {
    fn name(&self) -> &str;

    /// Layout the slide should reference, relative to the slide part.
    /// `None` uses the editor's default layout.
    fn layout_target(&self) -> Option<&str> {
        None
    }

    fn build(&self, data: &TemplateData) -> Result<XmlDocument>;
}

/// Local shape id counter for template output.
struct Ids(u32);

impl Ids {
    fn next(&mut self) -> ShapeId {
        self.0 += 1;
        ShapeId::new(self.0).unwrap_or(ShapeId::MIN)
    }
}

/// Centered title with a subtitle. Keys: `title`, `subtitle`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleSlideTemplate;

impl SlideTemplate for TitleSlideTemplate {
    fn name(&self) -> &str {
        "Title Slide"
    }

    fn layout_target(&self) -> Option<&str> {
        Some("../slideLayouts/slideLayout1.xml")
    }

    fn build(&self, data: &TemplateData) -> Result<XmlDocument> {
        let mut doc = blank_slide_document();
        let mut ids = Ids(1);
        if let Some(tree) = shape_tree_mut(doc.root_mut()) {
            tree.push_child(placeholder_shape(
                ids.next(),
                "Title 1",
                Some("ctrTitle"),
                None,
                &data.lines("title"),
            ));
            tree.push_child(placeholder_shape(
                ids.next(),
                "Subtitle 2",
                Some("subTitle"),
                Some(1),
                &data.lines("subtitle"),
            ));
        }
        Ok(doc)
    }
}

/// Title with a bulleted body, one paragraph per line. Keys: `title`, `body`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TitleAndContentTemplate;

impl SlideTemplate for TitleAndContentTemplate {
    fn name(&self) -> &str {
        "Title and Content"
    }

    fn layout_target(&self) -> Option<&str> {
        Some("../slideLayouts/slideLayout2.xml")
    }

    fn build(&self, data: &TemplateData) -> Result<XmlDocument> {
        let mut doc = blank_slide_document();
        let mut ids = Ids(1);
        if let Some(tree) = shape_tree_mut(doc.root_mut()) {
            tree.push_child(placeholder_shape(
                ids.next(),
                "Title 1",
                Some("title"),
                None,
                &data.lines("title"),
            ));
            tree.push_child(placeholder_shape(
                ids.next(),
                "Content Placeholder 2",
                None,
                Some(1),
                &data.lines("body"),
            ));
        }
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::pptx::slide::SlideContent;

    #[test]
    fn title_slide_fills_placeholders() {
        let data = TemplateData::new()
            .with("title", "Quarterly Review")
            .with("subtitle", "Q3 2026");
        let doc = TitleSlideTemplate.build(&data).unwrap();
        let content = SlideContent::from_document(1, &doc);
        assert_eq!(content.title(), Some("Quarterly Review"));
        assert_eq!(content.shapes[1].placeholder.as_deref(), Some("subTitle"));
        assert_eq!(content.shapes[1].text, "Q3 2026");
    }

    #[test]
    fn content_body_has_one_paragraph_per_line() {
        let data = TemplateData::new()
            .with("title", "Agenda")
            .with("body", "Intro\nNumbers\nNext steps");
        let doc = TitleAndContentTemplate.build(&data).unwrap();
        let content = SlideContent::from_document(1, &doc);
        assert_eq!(content.shapes[1].text, "Intro\nNumbers\nNext steps");
        assert_eq!(content.shapes[1].placeholder.as_deref(), Some("body"));
        assert_eq!(TitleAndContentTemplate.name(), "Title and Content");
    }

    #[test]
    fn missing_keys_leave_placeholders_empty() {
        let doc = TitleSlideTemplate.build(&TemplateData::new()).unwrap();
        let content = SlideContent::from_document(1, &doc);
        assert_eq!(content.shapes.len(), 2);
        assert_eq!(content.title(), Some(""));
    }
}
