//! Validation findings.
//!
//! Validation is read-only and never fails on integrity problems: they are
//! collected as findings. Errors are integrity violations that must be fixed;
//! warnings are cache/disk mismatches and tolerated anomalies.

use crate::common::Result;
use crate::ooxml::opc::constants::part_name;
use crate::ooxml::opc::{PackURI, PackageDir};
use crate::ooxml::pptx::slide_list::SlideList;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// One validation result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValidationFinding {
    pub severity: Severity,
    /// Stable machine-readable code such as `shape-duplicate-id`
    pub code: &'static str,
    pub message: String,
}

impl ValidationFinding {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}[{}]: {}", level, self.code, self.message)
    }
}

/// Findings split by severity, each list sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationFinding>,
    pub warnings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn from_findings<I>(findings: I) -> Self
    where
        I: IntoIterator<Item = ValidationFinding>,
    {
        let mut report = Self::default();
        report.extend(findings);
        report
    }

    /// Merge more findings, keeping both lists sorted.
    pub fn extend<I>(&mut self, findings: I)
    where
        I: IntoIterator<Item = ValidationFinding>,
    {
        for finding in findings {
            match finding.severity {
                Severity::Error => self.errors.push(finding),
                Severity::Warning => self.warnings.push(finding),
            }
        }
        for list in [&mut self.errors, &mut self.warnings] {
            list.sort();
            list.dedup();
        }
    }

    /// No errors. Warnings do not count.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.errors
            .iter()
            .chain(&self.warnings)
            .any(|finding| finding.code == code)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in self.errors.iter().chain(&self.warnings) {
            writeln!(f, "{}", finding)?;
        }
        Ok(())
    }
}

/// Package-level ordering checks: slide files contiguous from 1, slide list
/// in step with them.
pub fn check_structure(dir: &PackageDir) -> Result<Vec<ValidationFinding>> {
    let mut findings = Vec::new();
    let indices = dir.slide_indices()?;
    for (expected, actual) in (1u32..).zip(&indices) {
        if expected != *actual {
            findings.push(ValidationFinding::error(
                "slide-gap",
                format!("slide files are not contiguous: expected slide{expected}.xml, found slide{actual}.xml"),
            ));
            break;
        }
    }

    let presentation = PackURI::new(part_name::PRESENTATION)?;
    if !dir.exists(&presentation) {
        findings.push(ValidationFinding::error(
            "slide-list-missing",
            "presentation part is missing",
        ));
        return Ok(findings);
    }

    let list = SlideList::load(dir)?;
    if list.len() != indices.len() {
        findings.push(ValidationFinding::error(
            "slide-list-count",
            format!(
                "slide list has {} entries for {} slide files",
                list.len(),
                indices.len()
            ),
        ));
    }
    let mut listed = Vec::new();
    for entry in list.entries() {
        match list.slide_index_of(&entry) {
            Some(index) if dir.exists(&PackURI::slide(index)) => listed.push(index),
            Some(index) => findings.push(ValidationFinding::error(
                "slide-list-dangling",
                format!("slide list entry {} ({}) points at missing slide{}.xml", entry.id, entry.rel_id, index),
            )),
            None => findings.push(ValidationFinding::error(
                "slide-list-dangling",
                format!("slide list entry {} ({}) does not resolve to a slide", entry.id, entry.rel_id),
            )),
        }
    }
    for index in &indices {
        if !listed.contains(index) {
            findings.push(ValidationFinding::warning(
                "slide-unlisted",
                format!("slide{index}.xml is not in the slide list"),
            ));
        }
    }
    Ok(findings)
}
