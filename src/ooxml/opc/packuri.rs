//! Pack URIs: absolute part names inside a package.
//!
//! A PackURI always begins with a forward slash and uses forward slashes as
//! separators (`/ppt/slides/slide3.xml`). Besides the usual components (base
//! URI, filename, extension) it knows how to derive the paired relationship
//! part and how to resolve relative targets found in `.rels` parts.

use crate::ooxml::opc::constants::part_name;
use crate::ooxml::opc::error::{OpcError, Result};
use std::path::{Path, PathBuf};

/// An absolute part name within a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackURI {
    uri: String,
}

/// The package pseudo-partname, the source of `/_rels/.rels`
pub const PACKAGE_URI: &str = "/";

impl PackURI {
    /// Create a new PackURI.
    ///
    /// # Arguments
    /// * `uri` - The part name, which must begin with a forward slash
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        let uri = uri.into();
        if !uri.starts_with('/') {
            return Err(OpcError::InvalidPackUri(format!(
                "part name must begin with '/', got '{}'",
                uri
            )));
        }
        Ok(PackURI { uri })
    }

    /// The package pseudo-partname `/`.
    pub fn package() -> Self {
        PackURI {
            uri: PACKAGE_URI.to_string(),
        }
    }

    /// Part name of the slide at a 1-based physical index.
    pub fn slide(index: u32) -> Self {
        let mut buf = itoa::Buffer::new();
        PackURI {
            uri: format!("{}/slide{}.xml", part_name::SLIDES_DIR, buf.format(index)),
        }
    }

    /// Resolve a relative reference (such as `../slideLayouts/slideLayout1.xml`)
    /// against a base URI (such as `/ppt/slides`).
    pub fn from_rel_ref(base_uri: &str, relative_ref: &str) -> Result<Self> {
        if relative_ref.starts_with('/') {
            return Self::new(normalize(relative_ref));
        }
        let joined = if base_uri.ends_with('/') {
            format!("{}{}", base_uri, relative_ref)
        } else {
            format!("{}/{}", base_uri, relative_ref)
        };
        Self::new(normalize(&joined))
    }

    /// Directory portion, e.g. `/ppt/slides` for `/ppt/slides/slide1.xml`.
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// Filename portion, empty for the package pseudo-partname.
    pub fn filename(&self) -> &str {
        self.uri
            .rfind('/')
            .map_or("", |pos| &self.uri[pos + 1..])
    }

    /// Extension without the leading period.
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        filename.rfind('.').map_or("", |pos| &filename[pos + 1..])
    }

    /// Numeric suffix of a tuple part name: 21 for `slide21.xml`, `None` for
    /// `presentation.xml`.
    pub fn idx(&self) -> Option<u32> {
        let filename = self.filename();
        let stem = filename.split('.').next().unwrap_or(filename);
        let digits = stem.len() - stem.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 || digits == stem.len() {
            return None;
        }
        atoi_simd::parse::<u32, false, false>(&stem.as_bytes()[stem.len() - digits..]).ok()
    }

    /// URI with the leading slash stripped; the zip member name.
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// Relative reference from `base_uri` to this part.
    ///
    /// `/ppt/slideLayouts/slideLayout1.xml` relative to `/ppt/slides` is
    /// `../slideLayouts/slideLayout1.xml`.
    pub fn relative_ref(&self, base_uri: &str) -> String {
        let from: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();
        let common = from
            .iter()
            .zip(to.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut segments: Vec<&str> = vec![".."; from.len() - common];
        segments.extend_from_slice(&to[common..]);
        segments.join("/")
    }

    /// The paired relationship part, e.g. `/ppt/slides/_rels/slide1.xml.rels`.
    pub fn rels_uri(&self) -> PackURI {
        let base = self.base_uri();
        let uri = if base == "/" {
            format!("/_rels/{}.rels", self.filename())
        } else {
            format!("{}/_rels/{}.rels", base, self.filename())
        };
        PackURI { uri }
    }

    /// Inverse of [`rels_uri`](Self::rels_uri): the part a `.rels` part
    /// describes, or `None` if this is not a relationship part.
    pub fn rels_source(&self) -> Option<PackURI> {
        let source_name = self.filename().strip_suffix(".rels")?;
        let rels_dir = self.base_uri();
        let owner_dir = rels_dir.strip_suffix("/_rels")?;
        let uri = if source_name.is_empty() {
            PACKAGE_URI.to_string()
        } else {
            format!("{}/{}", owner_dir, source_name)
        };
        Some(PackURI { uri })
    }

    /// Whether the URI names a slide content part (`/ppt/slides/slideN.xml`).
    pub fn is_slide(&self) -> bool {
        self.base_uri() == part_name::SLIDES_DIR
            && self.filename().starts_with("slide")
            && self.ext() == "xml"
            && self.idx().is_some()
    }

    /// Filesystem location of this part under an extracted package root.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.uri.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.uri
    }
}

fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                stack.pop();
            },
            other => stack.push(other),
        }
    }
    format!("/{}", stack.join("/"))
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}
