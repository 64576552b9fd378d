//! Physical access to an extracted package directory.
//!
//! Every part is addressed by its [`PackURI`]; this module maps part names
//! onto files below the package root and performs the raw reads, writes and
//! renames the editing layer builds on.

use crate::common::xml::XmlDocument;
use crate::ooxml::opc::constants::part_name;
use crate::ooxml::opc::error::{OpcError, Result};
use crate::ooxml::opc::packuri::PackURI;
use crate::ooxml::opc::rel::Relationships;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An extracted package rooted at a directory.
#[derive(Debug, Clone)]
pub struct PackageDir {
    root: PathBuf,
}

impl PackageDir {
    /// Open an extracted package.
    ///
    /// # Errors
    /// Returns [`OpcError::PackageNotFound`] if `root` is not a directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(OpcError::PackageNotFound(root.display().to_string()));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a part.
    #[inline]
    pub fn path_of(&self, uri: &PackURI) -> PathBuf {
        uri.to_path(&self.root)
    }

    pub fn exists(&self, uri: &PackURI) -> bool {
        self.path_of(uri).is_file()
    }

    pub fn read_bytes(&self, uri: &PackURI) -> Result<Vec<u8>> {
        let path = self.path_of(uri);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OpcError::PartNotFound(uri.to_string()),
            _ => OpcError::io(path, e),
        })
    }

    /// Read and parse an XML part.
    pub fn read_xml(&self, uri: &PackURI) -> Result<XmlDocument> {
        let bytes = self.read_bytes(uri)?;
        XmlDocument::parse(&bytes).map_err(|e| OpcError::xml(uri.as_str(), e))
    }

    /// Read and parse an XML part, or `None` if it does not exist.
    pub fn read_xml_opt(&self, uri: &PackURI) -> Result<Option<XmlDocument>> {
        match self.read_xml(uri) {
            Ok(doc) => Ok(Some(doc)),
            Err(OpcError::PartNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write raw bytes, creating parent directories as needed.
    pub fn write_bytes(&self, uri: &PackURI, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(uri);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| OpcError::io(parent, e))?;
        }
        fs::write(&path, bytes).map_err(|e| OpcError::io(&path, e))?;
        debug!("Wrote part {} ({} bytes)", uri, bytes.len());
        Ok(())
    }

    pub fn write_xml(&self, uri: &PackURI, doc: &XmlDocument) -> Result<()> {
        self.write_bytes(uri, doc.to_xml_string().as_bytes())
    }

    /// Relationships of a source part; empty if it has no relationship part.
    pub fn read_rels(&self, source: &PackURI) -> Result<Relationships> {
        match self.read_xml_opt(&source.rels_uri())? {
            Some(doc) => Relationships::from_document(source.clone(), &doc),
            None => Ok(Relationships::new(source.clone())),
        }
    }

    /// Write the relationship part of `rels.source()`.
    pub fn write_rels(&self, rels: &Relationships) -> Result<()> {
        self.write_xml(&rels.source().rels_uri(), &rels.to_document())
    }

    /// Rename a part. The destination must not exist.
    pub fn rename(&self, from: &PackURI, to: &PackURI) -> Result<()> {
        let src = self.path_of(from);
        let dst = self.path_of(to);
        if dst.exists() {
            return Err(OpcError::io(
                &dst,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "rename target exists"),
            ));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).map_err(|e| OpcError::io(parent, e))?;
        }
        fs::rename(&src, &dst).map_err(|e| OpcError::io(&src, e))?;
        debug!("Renamed {} -> {}", from, to);
        Ok(())
    }

    /// Rename a part if it exists. Returns whether anything moved.
    pub fn rename_if_exists(&self, from: &PackURI, to: &PackURI) -> Result<bool> {
        if !self.exists(from) {
            return Ok(false);
        }
        self.rename(from, to)?;
        Ok(true)
    }

    /// Delete a part. Missing parts are not an error.
    pub fn remove(&self, uri: &PackURI) -> Result<bool> {
        let path = self.path_of(uri);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed part {}", uri);
                Ok(true)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(OpcError::io(path, e)),
        }
    }

    /// File names directly inside a package directory, sorted.
    pub fn list_dir(&self, dir_uri: &str) -> Result<Vec<String>> {
        let dir = PackURI::new(dir_uri)?.to_path(&self.root);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(OpcError::io(dir, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OpcError::io(&dir, e))?;
            if entry.path().is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Physical indices of the slide parts present, ascending.
    pub fn slide_indices(&self) -> Result<Vec<u32>> {
        let mut indices: Vec<u32> = self
            .list_dir(part_name::SLIDES_DIR)?
            .iter()
            .filter_map(|name| {
                let uri = PackURI::new(format!("{}/{}", part_name::SLIDES_DIR, name)).ok()?;
                if uri.is_slide() { uri.idx() } else { None }
            })
            .collect();
        indices.sort_unstable();
        Ok(indices)
    }

    /// Every relationship part present under `dir_uri`'s `_rels` directory.
    pub fn rels_parts_in(&self, dir_uri: &str) -> Result<Vec<PackURI>> {
        let rels_dir = if dir_uri == "/" {
            "/_rels".to_string()
        } else {
            format!("{}/_rels", dir_uri)
        };
        self.list_dir(&rels_dir)?
            .into_iter()
            .filter(|name| name.ends_with(".rels"))
            .map(|name| PackURI::new(format!("{}/{}", rels_dir, name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_requires_directory() {
        assert!(matches!(
            PackageDir::open("/definitely/not/here"),
            Err(OpcError::PackageNotFound(_))
        ));
    }

    #[test]
    fn write_read_rename_remove() {
        let dir = tempdir().unwrap();
        let pkg = PackageDir::open(dir.path()).unwrap();
        let doc = XmlDocument::parse_str("<p:sld xmlns:p=\"x\"/>").unwrap();

        pkg.write_xml(&PackURI::slide(1), &doc).unwrap();
        pkg.write_xml(&PackURI::slide(3), &doc).unwrap();
        pkg.write_bytes(&PackURI::new("/ppt/slides/notes.txt").unwrap(), b"x")
            .unwrap();
        assert_eq!(pkg.slide_indices().unwrap(), vec![1, 3]);

        pkg.rename(&PackURI::slide(3), &PackURI::slide(2)).unwrap();
        assert_eq!(pkg.slide_indices().unwrap(), vec![1, 2]);
        assert!(pkg.rename(&PackURI::slide(1), &PackURI::slide(2)).is_err());
        assert!(!pkg.rename_if_exists(&PackURI::slide(9), &PackURI::slide(10)).unwrap());

        assert_eq!(pkg.read_xml(&PackURI::slide(2)).unwrap(), doc);
        assert!(pkg.remove(&PackURI::slide(2)).unwrap());
        assert!(!pkg.remove(&PackURI::slide(2)).unwrap());
        assert!(pkg.read_xml_opt(&PackURI::slide(2)).unwrap().is_none());
    }

    #[test]
    fn malformed_parts_name_the_part() {
        let dir = tempdir().unwrap();
        let pkg = PackageDir::open(dir.path()).unwrap();
        pkg.write_bytes(&PackURI::slide(1), b"<p:sld><p:cSld></p:sld>").unwrap();
        let err = pkg.read_xml(&PackURI::slide(1)).unwrap_err();
        assert!(err.to_string().contains("/ppt/slides/slide1.xml"));
    }

    #[test]
    fn missing_rels_part_reads_empty() {
        let dir = tempdir().unwrap();
        let pkg = PackageDir::open(dir.path()).unwrap();
        let rels = pkg.read_rels(&PackURI::slide(4)).unwrap();
        assert!(rels.is_empty());
        assert_eq!(rels.source(), &PackURI::slide(4));
    }

    #[test]
    fn lists_rels_parts() {
        let dir = tempdir().unwrap();
        let pkg = PackageDir::open(dir.path()).unwrap();
        pkg.write_bytes(&PackURI::slide(1).rels_uri(), b"<Relationships/>").unwrap();
        let rels = pkg.rels_parts_in("/ppt/slides").unwrap();
        assert_eq!(rels, vec![PackURI::slide(1).rels_uri()]);
        assert!(pkg.rels_parts_in("/ppt").unwrap().is_empty());
    }
}
