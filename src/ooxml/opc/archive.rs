//! Conversion between a `.pptx` archive and an extracted package directory.
//!
//! The editing layer works on directories; this module is the boundary to the
//! zipped form. `[Content_Types].xml` is written as the first member, which is
//! what Office expects to find when sniffing a package.

use crate::ooxml::opc::error::{OpcError, Result};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

const CONTENT_TYPES_MEMBER: &str = "[Content_Types].xml";

/// Extract an archive into `dest`, creating it if needed.
///
/// Members whose names would escape `dest` are rejected.
///
/// # Returns
/// The number of files written.
pub fn extract_package<P: AsRef<Path>, Q: AsRef<Path>>(archive: P, dest: Q) -> Result<usize> {
    let archive = archive.as_ref();
    let dest = dest.as_ref();
    let file = File::open(archive).map_err(|e| OpcError::io(archive, e))?;
    let mut reader = ZipArchive::new(file)?;
    fs::create_dir_all(dest).map_err(|e| OpcError::io(dest, e))?;

    let mut written = 0;
    for i in 0..reader.len() {
        let mut member = reader.by_index(i)?;
        let Some(relative) = member.enclosed_name() else {
            return Err(OpcError::Archive(format!(
                "member '{}' escapes the package root",
                member.name()
            )));
        };
        let out_path = dest.join(relative);
        if member.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| OpcError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| OpcError::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| OpcError::io(&out_path, e))?;
        io::copy(&mut member, &mut out).map_err(|e| OpcError::io(&out_path, e))?;
        written += 1;
    }

    info!("Extracted {} parts from {}", written, archive.display());
    Ok(written)
}

/// Compress the package directory `src` into a new archive at `archive`.
///
/// # Returns
/// The number of files stored.
pub fn compress_package<P: AsRef<Path>, Q: AsRef<Path>>(src: P, archive: Q) -> Result<usize> {
    let src = src.as_ref();
    let archive = archive.as_ref();

    let mut members = Vec::new();
    collect_files(src, src, &mut members)?;
    // Content types first, then stable lexical order
    members.sort_by(|(a, _), (b, _)| {
        (a != CONTENT_TYPES_MEMBER)
            .cmp(&(b != CONTENT_TYPES_MEMBER))
            .then_with(|| a.cmp(b))
    });

    let file = File::create(archive).map_err(|e| OpcError::io(archive, e))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, path) in &members {
        let bytes = fs::read(path).map_err(|e| OpcError::io(path, e))?;
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&bytes).map_err(|e| OpcError::io(archive, e))?;
        debug!("Stored {} ({} bytes)", name, bytes.len());
    }
    writer.finish()?;

    info!("Compressed {} parts into {}", members.len(), archive.display());
    Ok(members.len())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| OpcError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| OpcError::io(dir, e))?.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
            continue;
        }
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        out.push((name, path));
    }
    Ok(())
}
