//! Slide content parts (`/ppt/slides/slideN.xml`).
//!
//! Shape identity lives on the `cNvPr` element inside each shape's
//! non-visual properties (`p:nvSpPr`, `p:nvPicPr`, ...). The shape tree's own
//! `nvGrpSpPr` (conventionally id 1) is not a shape and is never visited.

use crate::common::xml::{XmlDocument, XmlElement, unescape_xml};
use crate::ooxml::opc::constants::namespace;
use crate::ooxml::pptx::animations::AnimationBinding;
use crate::ooxml::pptx::ids::ShapeId;
use crate::ooxml::pptx::timing::TimingTree;

/// Element names that carry a shape identity.
const SHAPE_ELEMENTS: [&str; 6] = ["sp", "pic", "grpSp", "graphicFrame", "cxnSp", "contentPart"];

/// Kind of drawable object, by element name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Shape,
    Picture,
    Group,
    GraphicFrame,
    Connector,
    ContentPart,
}

impl ShapeKind {
    fn from_local_name(name: &str) -> Option<Self> {
        Some(match name {
            "sp" => ShapeKind::Shape,
            "pic" => ShapeKind::Picture,
            "grpSp" => ShapeKind::Group,
            "graphicFrame" => ShapeKind::GraphicFrame,
            "cxnSp" => ShapeKind::Connector,
            "contentPart" => ShapeKind::ContentPart,
            _ => return None,
        })
    }
}

#[inline]
fn is_shape(el: &XmlElement) -> bool {
    SHAPE_ELEMENTS.contains(&el.local_name())
}

#[inline]
fn is_nv_props(el: &XmlElement) -> bool {
    let name = el.local_name();
    name.starts_with("nv") && name.ends_with("Pr")
}

/// The `p:cSld/p:spTree` element of a slide root.
pub fn shape_tree(root: &XmlElement) -> Option<&XmlElement> {
    root.child("cSld")?.child("spTree")
}

pub fn shape_tree_mut(root: &mut XmlElement) -> Option<&mut XmlElement> {
    root.child_mut("cSld")?.child_mut("spTree")
}

/// The `cNvPr` identity element of a shape.
pub fn identity(shape: &XmlElement) -> Option<&XmlElement> {
    shape.elements().find(|el| is_nv_props(el))?.child("cNvPr")
}

fn identity_mut(shape: &mut XmlElement) -> Option<&mut XmlElement> {
    shape.elements_mut().find(|el| is_nv_props(el))?.child_mut("cNvPr")
}

/// Every shape element of a slide in document order, group members after
/// their group.
pub fn shapes(root: &XmlElement) -> Vec<&XmlElement> {
    let mut out = Vec::new();
    if let Some(tree) = shape_tree(root) {
        collect_shapes(tree, &mut out);
    }
    out
}

fn collect_shapes<'a>(container: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
    for child in container.elements() {
        if is_shape(child) {
            out.push(child);
            if child.is("grpSp") {
                collect_shapes(child, out);
            }
        } else if child.is("AlternateContent") {
            // Choice and Fallback describe the same shape; only Choice counts
            if let Some(choice) = child.child("Choice") {
                collect_shapes(choice, out);
            }
        }
    }
}

/// Visit every shape identity element in document order.
pub fn for_each_identity_mut<F>(root: &mut XmlElement, f: &mut F)
where
    F: FnMut(&mut XmlElement),
{
    if let Some(tree) = shape_tree_mut(root) {
        visit_identities_mut(tree, f);
    }
}

fn visit_identities_mut<F>(container: &mut XmlElement, f: &mut F)
where
    F: FnMut(&mut XmlElement),
{
    for child in container.elements_mut() {
        if is_shape(child) {
            if let Some(cnvpr) = identity_mut(child) {
                f(cnvpr);
            }
            if child.is("grpSp") {
                visit_identities_mut(child, f);
            }
        } else if child.is("AlternateContent") {
            if let Some(choice) = child.child_mut("Choice") {
                visit_identities_mut(choice, f);
            }
        }
    }
}

/// `(raw id token, name)` of every shape identity in document order.
pub fn identity_tokens(root: &XmlElement) -> Vec<(String, String)> {
    shapes(root)
        .into_iter()
        .filter_map(identity)
        .map(|cnvpr| {
            (
                cnvpr.attr("id").unwrap_or_default().to_string(),
                cnvpr.attr("name").map(unescape_xml).unwrap_or_default(),
            )
        })
        .collect()
}

/// One drawable object as seen by a reader of the slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeSummary {
    /// Parsed id; `None` when the token is malformed
    pub id: Option<ShapeId>,
    pub name: String,
    pub kind: ShapeKind,
    /// Placeholder type (`title`, `body`, ...) when the shape is a placeholder
    pub placeholder: Option<String>,
    /// Concatenated run text
    pub text: String,
}

/// Parsed view of a slide part.
#[derive(Debug, Clone, Default)]
pub struct SlideContent {
    pub index: u32,
    pub shapes: Vec<ShapeSummary>,
    pub timing: TimingTree,
    pub bindings: Vec<AnimationBinding>,
}

impl SlideContent {
    pub fn from_document(index: u32, doc: &XmlDocument) -> Self {
        let root = doc.root();
        let shapes = shapes(root)
            .into_iter()
            .filter_map(|shape| {
                let kind = ShapeKind::from_local_name(shape.local_name())?;
                let cnvpr = identity(shape);
                let placeholder = shape
                    .find("ph")
                    .map(|ph| ph.attr("type").unwrap_or("body").to_string());
                let text = shape
                    .child("txBody")
                    .map(|body| {
                        body.children_named("p")
                            .map(XmlElement::text)
                            .collect::<Vec<_>>()
                            .join("\n")
                    })
                    .unwrap_or_default();
                Some(ShapeSummary {
                    id: cnvpr.and_then(|c| c.attr("id")).and_then(ShapeId::parse),
                    name: cnvpr
                        .and_then(|c| c.attr("name"))
                        .map(unescape_xml)
                        .unwrap_or_default(),
                    kind,
                    placeholder,
                    text,
                })
            })
            .collect();

        Self {
            index,
            shapes,
            timing: TimingTree::from_slide(root),
            bindings: AnimationBinding::collect(root),
        }
    }

    /// Ids of every shape with a well-formed id.
    pub fn shape_ids(&self) -> std::collections::BTreeSet<ShapeId> {
        self.shapes.iter().filter_map(|s| s.id).collect()
    }

    /// Text of the title placeholder, if any.
    pub fn title(&self) -> Option<&str> {
        self.shapes
            .iter()
            .find(|s| matches!(s.placeholder.as_deref(), Some("title" | "ctrTitle")))
            .map(|s| s.text.as_str())
    }
}

/// Build a text placeholder shape.
///
/// # Arguments
/// * `id` - Shape id written to `cNvPr`
/// * `name` - Display name
/// * `ph_type` - Placeholder type; `None` for the default body placeholder
/// * `idx` - Placeholder index linking the shape to its layout counterpart
/// * `paragraphs` - One paragraph per entry
pub fn placeholder_shape(
    id: ShapeId,
    name: &str,
    ph_type: Option<&str>,
    idx: Option<u32>,
    paragraphs: &[&str],
) -> XmlElement {
    let mut ph = XmlElement::new("p:ph");
    if let Some(ph_type) = ph_type {
        ph.set_attr("type", ph_type);
    }
    if let Some(idx) = idx {
        let mut buf = itoa::Buffer::new();
        ph.set_attr("idx", buf.format(idx));
    }

    let mut body = XmlElement::new("p:txBody")
        .with_child(XmlElement::new("a:bodyPr"))
        .with_child(XmlElement::new("a:lstStyle"));
    for text in paragraphs {
        body.push_child(text_paragraph(text));
    }
    if paragraphs.is_empty() {
        body.push_child(XmlElement::new("a:p"));
    }

    XmlElement::new("p:sp")
        .with_child(
            XmlElement::new("p:nvSpPr")
                .with_child(
                    XmlElement::new("p:cNvPr")
                        .with_attr("id", &id.to_string())
                        .with_attr("name", name),
                )
                .with_child(
                    XmlElement::new("p:cNvSpPr")
                        .with_child(XmlElement::new("a:spLocks").with_attr("noGrp", "1")),
                )
                .with_child(XmlElement::new("p:nvPr").with_child(ph)),
        )
        .with_child(XmlElement::new("p:spPr"))
        .with_child(body)
}

fn text_paragraph(text: &str) -> XmlElement {
    XmlElement::new("a:p").with_child(
        XmlElement::new("a:r")
            .with_child(XmlElement::new("a:rPr").with_attr("lang", "en-US").with_attr("dirty", "0"))
            .with_child(XmlElement::new("a:t").with_text(text)),
    )
}

/// An empty slide: shape tree root plus master colour mapping.
///
/// Shapes appended to the returned document's shape tree keep the ids they
/// were built with; run the result through
/// [`regenerate_shape_ids`](crate::ooxml::pptx::rewrite::regenerate_shape_ids)
/// before writing it into a package.
pub fn blank_slide_document() -> XmlDocument {
    let xfrm = XmlElement::new("a:xfrm")
        .with_child(XmlElement::new("a:off").with_attr("x", "0").with_attr("y", "0"))
        .with_child(XmlElement::new("a:ext").with_attr("cx", "0").with_attr("cy", "0"))
        .with_child(XmlElement::new("a:chOff").with_attr("x", "0").with_attr("y", "0"))
        .with_child(XmlElement::new("a:chExt").with_attr("cx", "0").with_attr("cy", "0"));

    let sp_tree = XmlElement::new("p:spTree")
        .with_child(
            XmlElement::new("p:nvGrpSpPr")
                .with_child(XmlElement::new("p:cNvPr").with_attr("id", "1").with_attr("name", ""))
                .with_child(XmlElement::new("p:cNvGrpSpPr"))
                .with_child(XmlElement::new("p:nvPr")),
        )
        .with_child(XmlElement::new("p:grpSpPr").with_child(xfrm));

    let root = XmlElement::new("p:sld")
        .with_attr("xmlns:a", namespace::DML_MAIN)
        .with_attr("xmlns:r", namespace::OFC_RELATIONSHIPS)
        .with_attr("xmlns:p", namespace::PML_MAIN)
        .with_child(XmlElement::new("p:cSld").with_child(sp_tree))
        .with_child(
            XmlElement::new("p:clrMapOvr").with_child(XmlElement::new("a:masterClrMapping")),
        );
    XmlDocument::new(root)
}

/// Blank slide with an optional title placeholder.
pub fn blank_slide_with_title(title: Option<&str>) -> XmlDocument {
    let mut doc = blank_slide_document();
    if let Some(title) = title
        && let Some(tree) = shape_tree_mut(doc.root_mut())
    {
        tree.push_child(placeholder_shape(
            ShapeId::MIN,
            "Title 1",
            Some("title"),
            None,
            &[title],
        ));
    }
    doc
}

/// Replace the text of the slide's title placeholder. Returns whether a
/// title placeholder was found.
pub fn set_title(doc: &mut XmlDocument, title: &str) -> bool {
    let Some(tree) = shape_tree_mut(doc.root_mut()) else {
        return false;
    };
    let is_title = |el: &XmlElement| {
        el.is("sp")
            && el
                .find("ph")
                .is_some_and(|ph| matches!(ph.attr("type"), Some("title" | "ctrTitle")))
    };
    let Some(shape) = tree.find_where_mut(&is_title) else {
        return false;
    };
    let body = shape.ensure_child("txBody");
    body.remove_children_where(|el| el.is("p"));
    body.push_child(text_paragraph(title));
    true
}
