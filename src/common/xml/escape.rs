use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;

static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("Failed to build XML escaper")
});

// LeftmostLongest so "&amp;lt;" decodes to "&lt;" and not "<"
static XML_UNESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
        .expect("Failed to build XML unescaper")
});

/// Escape the five XML special characters for use in attribute values or text.
///
/// # Examples
///
/// ```
/// use slidesmith::common::xml::escape_xml;
/// assert_eq!(escape_xml("../media/a&b.png"), "../media/a&amp;b.png");
/// ```
#[inline]
pub fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}

/// Replace the five predefined XML entities with their characters.
///
/// Character references (`&#10;`) and unknown entities are left unchanged.
///
/// # Examples
///
/// ```
/// use slidesmith::common::xml::unescape_xml;
/// assert_eq!(unescape_xml("Q&amp;A &lt;draft&gt;"), "Q&A <draft>");
/// assert_eq!(unescape_xml("&amp;lt;"), "&lt;");
/// ```
#[inline]
pub fn unescape_xml(s: &str) -> String {
    XML_UNESCAPER.replace_all(s, &["&", "<", ">", "\"", "'"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_then_unescape_restores_text() {
        let raw = r#"Title "A" & <B>'s"#;
        assert_eq!(unescape_xml(&escape_xml(raw)), raw);
    }

    #[test]
    fn unknown_entities_survive() {
        assert_eq!(unescape_xml("&nbsp;&#10;"), "&nbsp;&#10;");
    }
}
