//! Owned element tree for package parts.
//!
//! Parts are edited in place (ids rewritten, children appended) and written
//! back, so the tree keeps everything needed for a faithful round trip:
//! attribute order, namespace prefixes, and text exactly as it appeared in the
//! markup. Attribute values and text nodes are therefore stored in their
//! *escaped* form; [`XmlElement::set_attr`] and [`XmlElement::with_text`]
//! escape their input, [`XmlElement::text`] unescapes on the way out.
//!
//! Lookups match on local names (`"cNvPr"` matches `p:cNvPr`), which is how
//! the rest of the crate treats PresentationML.

use super::escape::{escape_xml, unescape_xml};
use quick_xml::Reader;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use std::fmt::Write as FmtWrite;
use thiserror::Error;

/// Errors raised while parsing markup into an [`XmlDocument`].
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    #[error("Malformed attribute: {0}")]
    Attribute(String),

    #[error("Invalid UTF-8 in markup: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Unbalanced end tag")]
    Unbalanced,

    #[error("Document has no root element")]
    NoRoot,
}

/// A node in the element tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Escaped character data
    Text(String),
    CData(String),
    Comment(String),
}

/// The `<?xml ...?>` declaration of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<String>,
}

impl Default for Declaration {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: Some("yes".to_string()),
        }
    }
}

impl Declaration {
    fn from_decl(decl: &BytesDecl<'_>) -> Self {
        let version = decl
            .version()
            .map(|v| String::from_utf8_lossy(&v).into_owned())
            .unwrap_or_else(|_| "1.0".to_string());
        let encoding = decl
            .encoding()
            .and_then(|r| r.ok())
            .map(|v| String::from_utf8_lossy(&v).into_owned());
        let standalone = decl
            .standalone()
            .and_then(|r| r.ok())
            .map(|v| String::from_utf8_lossy(&v).into_owned());
        Self {
            version,
            encoding,
            standalone,
        }
    }
}

/// A parsed part: optional declaration plus a single root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    declaration: Option<Declaration>,
    root: XmlElement,
}

impl XmlDocument {
    /// Create a document with the standard OOXML declaration.
    pub fn new(root: XmlElement) -> Self {
        Self {
            declaration: Some(Declaration::default()),
            root,
        }
    }

    /// Parse a document from raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, XmlError> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut declaration = None;
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Decl(decl) => declaration = Some(Declaration::from_decl(&decl)),
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element);
                },
                Event::End(_) => {
                    let element = stack.pop().ok_or(XmlError::Unbalanced)?;
                    attach(&mut stack, &mut root, element);
                },
                Event::Text(text) => push_text(&mut stack, std::str::from_utf8(&text)?),
                Event::GeneralRef(entity) => {
                    let name = std::str::from_utf8(&entity)?;
                    push_text(&mut stack, &format!("&{};", name));
                },
                Event::CData(data) => {
                    if let Some(parent) = stack.last_mut() {
                        let data = std::str::from_utf8(&data)?.to_string();
                        parent.children.push(XmlNode::CData(data));
                    }
                },
                Event::Comment(comment) => {
                    if let Some(parent) = stack.last_mut() {
                        let comment = std::str::from_utf8(&comment)?.to_string();
                        parent.children.push(XmlNode::Comment(comment));
                    }
                },
                Event::Eof => break,
                _ => {},
            }
            buf.clear();
        }

        if !stack.is_empty() {
            return Err(XmlError::Unbalanced);
        }
        let root = root.ok_or(XmlError::NoRoot)?;
        Ok(Self { declaration, root })
    }

    /// Parse a document from a string.
    pub fn parse_str(xml: &str) -> Result<Self, XmlError> {
        Self::parse(xml.as_bytes())
    }

    #[inline]
    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    #[inline]
    pub fn root_mut(&mut self) -> &mut XmlElement {
        &mut self.root
    }

    pub fn into_root(self) -> XmlElement {
        self.root
    }

    /// Serialize the document back to markup.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::with_capacity(4096);
        if let Some(decl) = &self.declaration {
            let _ = write!(out, r#"<?xml version="{}""#, decl.version);
            if let Some(encoding) = &decl.encoding {
                let _ = write!(out, r#" encoding="{}""#, encoding);
            }
            if let Some(standalone) = &decl.standalone {
                let _ = write!(out, r#" standalone="{}""#, standalone);
            }
            out.push_str("?>\n");
        }
        self.root.write_into(&mut out);
        out
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())?.to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::Attribute(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
        let value = std::str::from_utf8(&attr.value)?.to_string();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(stack: &mut [XmlElement], root: &mut Option<XmlElement>, element: XmlElement) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => *root = Some(element),
    }
}

fn push_text(stack: &mut [XmlElement], text: &str) {
    // Text outside the root element is insignificant whitespace
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
        existing.push_str(text);
    } else {
        parent.children.push(XmlNode::Text(text.to_string()));
    }
}

/// An element with ordered attributes and mixed children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    /// Create an empty element with a qualified name such as `"p:sld"`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`set_attr`](Self::set_attr).
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder form of [`push_child`](Self::push_child).
    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.push_child(child);
        self
    }

    /// Append a text node; `text` is escaped.
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(XmlNode::Text(escape_xml(text)));
        self
    }

    /// Qualified name, prefix included.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace prefix, if the name is qualified.
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Name without its namespace prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Whether this element's local name equals `local`.
    #[inline]
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    /// Build a qualified name for a sibling/child in this element's namespace.
    pub fn qualified(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{}:{}", prefix, local),
            None => local.to_string(),
        }
    }

    /// Raw (escaped) value of the attribute with this exact qualified key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Raw value of the first attribute whose local name matches, ignoring
    /// namespace declarations.
    pub fn attr_local(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .filter(|(k, _)| k != "xmlns" && !k.starts_with("xmlns:"))
            .find(|(k, _)| local_part(k) == local)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, escaping `value`. Existing attributes keep their
    /// position; new ones are appended.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        self.set_attr_raw(key, escape_xml(value));
    }

    /// Set an attribute to an already-escaped value.
    pub fn set_attr_raw(&mut self, key: &str, value: String) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// Remove an attribute, returning its raw value.
    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Iterate over `(key, raw value)` pairs in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Iterate over attributes with mutable access to the raw values.
    pub fn attributes_mut(&mut self) -> impl Iterator<Item = (&str, &mut String)> {
        self.attributes.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    pub fn children(&self) -> &[XmlNode] {
        &self.children
    }

    #[inline]
    pub fn children_mut(&mut self) -> &mut Vec<XmlNode> {
        &mut self.children
    }

    /// Child elements, skipping text and comments.
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            _ => None,
        })
    }

    /// First child element with this local name.
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.elements_mut().find(|el| el.is(local))
    }

    /// All child elements with this local name.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |el| el.is(local))
    }

    /// Return the child with this local name, creating it (in this element's
    /// namespace) at the end if missing.
    pub fn ensure_child(&mut self, local: &str) -> &mut XmlElement {
        let pos = match self.child_index(local) {
            Some(pos) => pos,
            None => {
                let name = self.qualified(local);
                self.children.push(XmlNode::Element(XmlElement::new(name)));
                self.children.len() - 1
            },
        };
        match &mut self.children[pos] {
            XmlNode::Element(el) => el,
            _ => unreachable!("child_index only reports element nodes"),
        }
    }

    /// Node index of the first child element with this local name.
    pub fn child_index(&self, local: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|node| matches!(node, XmlNode::Element(el) if el.is(local)))
    }

    pub fn push_child(&mut self, child: XmlElement) {
        self.children.push(XmlNode::Element(child));
    }

    /// Insert a child element at a node index (clamped to the end).
    pub fn insert_child(&mut self, index: usize, child: XmlElement) {
        let index = index.min(self.children.len());
        self.children.insert(index, XmlNode::Element(child));
    }

    /// Remove and return the node at `index`.
    pub fn remove_child_at(&mut self, index: usize) -> XmlNode {
        self.children.remove(index)
    }

    /// Remove every child element matching the predicate; returns how many were removed.
    pub fn remove_children_where<F>(&mut self, mut pred: F) -> usize
    where
        F: FnMut(&XmlElement) -> bool,
    {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, XmlNode::Element(el) if pred(el)));
        before - self.children.len()
    }

    /// All descendant elements (excluding `self`) in document order.
    pub fn descendants(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        self.collect_descendants(&mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a XmlElement>) {
        for el in self.elements() {
            out.push(el);
            el.collect_descendants(out);
        }
    }

    /// First descendant (pre-order, excluding `self`) with this local name.
    pub fn find(&self, local: &str) -> Option<&XmlElement> {
        self.find_where(&|el| el.is(local))
    }

    /// First descendant matching the predicate.
    pub fn find_where(&self, pred: &dyn Fn(&XmlElement) -> bool) -> Option<&XmlElement> {
        for el in self.elements() {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = el.find_where(pred) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.find_where_mut(&|el| el.is(local))
    }

    pub fn find_where_mut(
        &mut self,
        pred: &dyn Fn(&XmlElement) -> bool,
    ) -> Option<&mut XmlElement> {
        for el in self.elements_mut() {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = el.find_where_mut(pred) {
                return Some(found);
            }
        }
        None
    }

    /// Visit `self` and every descendant element in document order.
    pub fn walk_mut<F>(&mut self, f: &mut F)
    where
        F: FnMut(&mut XmlElement),
    {
        f(self);
        for el in self.elements_mut() {
            el.walk_mut(f);
        }
    }

    /// Concatenated, unescaped text of all descendant text and CDATA nodes.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                XmlNode::Text(text) => out.push_str(&unescape_xml(text)),
                XmlNode::CData(data) => out.push_str(data),
                XmlNode::Element(el) => el.collect_text(out),
                XmlNode::Comment(_) => {},
            }
        }
    }

    /// Serialize this element (without a declaration).
    pub fn to_xml_string(&self) -> String {
        let mut out = String::with_capacity(1024);
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            // Values were captured raw; keep whichever quote they can live in
            let quote = if value.contains('"') { '\'' } else { '"' };
            out.push(' ');
            out.push_str(key);
            out.push('=');
            out.push(quote);
            out.push_str(value);
            out.push(quote);
        }

        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        for node in &self.children {
            match node {
                XmlNode::Element(el) => el.write_into(out),
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::CData(data) => {
                    out.push_str("<![CDATA[");
                    out.push_str(data);
                    out.push_str("]]>");
                },
                XmlNode::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(comment);
                    out.push_str("-->");
                },
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

#[inline]
fn local_part(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIDE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:nvSpPr><p:cNvPr id="4" name="Title &amp; Body"/></p:nvSpPr><p:txBody><a:p><a:r><a:t>Q&amp;A &lt;1&gt;</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld><!-- kept --></p:sld>"#;

    #[test]
    fn round_trip_preserves_markup() {
        let doc = XmlDocument::parse_str(SLIDE).unwrap();
        let written = doc.to_xml_string();
        assert_eq!(written, SLIDE);
    }

    #[test]
    fn lookups_use_local_names() {
        let doc = XmlDocument::parse_str(SLIDE).unwrap();
        let cnvpr = doc.root().find("cNvPr").unwrap();
        assert_eq!(cnvpr.name(), "p:cNvPr");
        assert_eq!(cnvpr.attr("id"), Some("4"));
        assert_eq!(cnvpr.attr_local("name"), Some("Title &amp; Body"));
        assert_eq!(doc.root().find("t").unwrap().text(), "Q&A <1>");
    }

    #[test]
    fn set_attr_escapes_and_keeps_order() {
        let mut el = XmlElement::new("p:cNvPr")
            .with_attr("id", "1")
            .with_attr("name", "x");
        el.set_attr("id", "7");
        el.set_attr("descr", "a<b");
        let keys: Vec<_> = el.attributes().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["id", "name", "descr"]);
        assert_eq!(el.attr("descr"), Some("a&lt;b"));
    }

    #[test]
    fn walk_mut_visits_in_document_order() {
        let mut doc = XmlDocument::parse_str(SLIDE).unwrap();
        let mut names = Vec::new();
        doc.root_mut()
            .walk_mut(&mut |el| names.push(el.local_name().to_string()));
        assert_eq!(&names[..4], &["sld", "cSld", "spTree", "sp"]);
    }

    #[test]
    fn ensure_child_reuses_prefix() {
        let mut el = XmlElement::new("p:cTn");
        el.ensure_child("childTnLst");
        el.ensure_child("childTnLst");
        assert_eq!(el.elements().count(), 1);
        assert_eq!(el.child("childTnLst").unwrap().name(), "p:childTnLst");
    }

    #[test]
    fn rejects_unbalanced_markup() {
        assert!(XmlDocument::parse_str("<a><b></a>").is_err());
        assert!(matches!(
            XmlDocument::parse_str("<?xml version=\"1.0\"?>"),
            Err(XmlError::NoRoot)
        ));
    }
}
