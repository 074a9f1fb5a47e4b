//! Structural pre-check of a candidate template archive.
//!
//! Cheaper than [`codec::load`](crate::codec::load): it only looks at the file
//! name and the ZIP directory, never at member contents. Every problem found
//! is reported, so a user fixing a template sees the whole list at once.
//!
//! Checks, in order:
//!
//! 1. The file name ends in `.dlpt` or `.zip`.
//! 2. The bytes open as a ZIP archive (if not, member checks are skipped).
//! 3. Each required role has at least one entry whose name is, or ends in
//!    `/` followed by, one of the role's aliases.

use crate::codec::Role;
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;

/// File extensions accepted for template archives.
pub const ARCHIVE_EXTENSIONS: [&str; 2] = ["dlpt", "zip"];

/// One problem found by the pre-check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    #[error("File extension must be .dlpt or .zip (got {0})")]
    BadExtension(String),
    #[error("Cannot read file: {0}")]
    Unreadable(String),
    #[error("Invalid ZIP file: {0}")]
    InvalidZip(String),
    #[error("Required file missing: {0}")]
    MissingMember(Role),
}

/// Outcome of [`validate_archive`]: valid when no issue was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Human-readable messages, one per issue.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// `{valid, errors}` shape handed to hosts.
#[derive(Debug, Serialize)]
pub struct ValidationSummary {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl From<&ValidationReport> for ValidationSummary {
    fn from(report: &ValidationReport) -> Self {
        Self {
            valid: report.is_valid(),
            errors: report.messages(),
        }
    }
}

/// Validate an archive on disk.
pub fn validate_archive(path: &Path) -> ValidationReport {
    let name = path.to_string_lossy();
    let report = match std::fs::read(path) {
        Ok(bytes) => validate_bytes(&name, &bytes),
        Err(e) => {
            let mut report = ValidationReport::default();
            check_extension(&name, &mut report);
            report.errors.push(ValidationIssue::Unreadable(e.to_string()));
            report
        }
    };
    log_report(&name, &report);
    report
}

/// Validate archive bytes, using `file_name` for the extension check.
pub fn validate_bytes(file_name: &str, bytes: &[u8]) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_extension(file_name, &mut report);

    let zip = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(zip) => zip,
        Err(e) => {
            report.errors.push(ValidationIssue::InvalidZip(e.to_string()));
            return report;
        }
    };

    let names: Vec<String> = zip.file_names().map(|n| n.replace('\\', "/")).collect();
    for role in Role::REQUIRED {
        let present = role
            .aliases()
            .iter()
            .any(|alias| names.iter().any(|name| matches_member(name, alias)));
        if !present {
            report.errors.push(ValidationIssue::MissingMember(role));
        }
    }
    report
}

fn check_extension(file_name: &str, report: &mut ValidationReport) {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext {
        Some(ext) if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) => {}
        Some(ext) => report
            .errors
            .push(ValidationIssue::BadExtension(format!(".{ext}"))),
        None => report
            .errors
            .push(ValidationIssue::BadExtension("no extension".into())),
    }
}

fn matches_member(entry: &str, alias: &str) -> bool {
    entry == alias
        || entry
            .strip_suffix(alias)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

fn log_report(name: &str, report: &ValidationReport) {
    if report.is_valid() {
        tracing::debug!(target: "validate", file = name, "Archive passed pre-check");
    } else {
        tracing::warn!(
            target: "validate",
            file = name,
            errors = ?report.messages(),
            "Archive failed pre-check"
        );
    }
}
