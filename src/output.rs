//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output leads with what a thing *is* (template name, field label, output
//! file) and shows identifiers and paths as indented context lines. A reader
//! gets an inventory of the template without knowing its ZIP layout.
//!
//! # Output Format
//!
//! ## Validate
//!
//! ```text
//! ✓ landing.dlpt
//! ```
//!
//! ```text
//! ✗ broken.zip
//!     Required file missing: manifest.json or template.json
//!     Required file missing: style.css
//! ```
//!
//! ## Inspect
//!
//! ```text
//! Sample Template 1.0.0
//!     Id: sample
//!     Author: Circle Name
//!     Draft: no
//!
//! Sections
//! 001 Basic
//!     title        Title          text → text
//!     opacity      Opacity        number → slider (debounced)
//!
//! Assets (2, 14.2 KiB)
//!     assets/logo.png
//!     images/hero.jpg
//! ```
//!
//! ## Build
//!
//! ```text
//! Built site.zip
//!     Assets: 2
//!     Extracted: assets/inline-image-1.png
//!     Reused: 1
//!     Skipped: Skipped inline image/png asset: Invalid padding
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::archive::TemplateArchive;
use crate::config::EditorConfig;
use crate::export::BuildReport;
use crate::schema::{EditMode, Field, TemplateSchema, Widget};
use crate::validate::ValidationReport;
use serde_json::Value;
use std::path::Path;

const DESCRIPTION_CHARS: usize = 60;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Human-readable byte count.
fn format_bytes(n: usize) -> String {
    const KIB: f64 = 1024.0;
    let n = n as f64;
    if n < KIB {
        format!("{} B", n)
    } else if n < KIB * KIB {
        format!("{:.1} KiB", n / KIB)
    } else {
        format!("{:.1} MiB", n / (KIB * KIB))
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn widget_name(widget: Widget) -> &'static str {
    match widget {
        Widget::Text => "text",
        Widget::TextArea { .. } => "textarea",
        Widget::Number => "number",
        Widget::Slider => "slider",
        Widget::Color => "color",
        Widget::Select => "select",
        Widget::Toggle => "toggle",
        Widget::Image => "image",
        Widget::Array => "array",
    }
}

/// One field row: id, label, declared type and the widget that edits it.
///
/// ```text
/// opacity      Opacity        number → slider (debounced)
/// ```
fn field_line(field: &Field, editor: &EditorConfig) -> String {
    let widget = field.widget();
    let debounced = match widget.edit_mode(editor) {
        EditMode::Debounced(_) => " (debounced)",
        EditMode::Immediate => "",
    };
    let required = if field.required { " *" } else { "" };
    format!(
        "{:<12} {:<14} {} → {}{}{}",
        field.id,
        field.display_label(),
        field.kind.type_name(),
        widget_name(widget),
        debounced,
        required
    )
}

// ============================================================================
// validate
// ============================================================================

/// Format a validation result: a check line, then one line per issue.
pub fn format_validation(path: &Path, report: &ValidationReport) -> Vec<String> {
    let mark = if report.is_valid() { "✓" } else { "✗" };
    let mut lines = vec![format!("{} {}", mark, file_name(path))];
    lines.extend(
        report
            .messages()
            .into_iter()
            .map(|msg| format!("{}{}", indent(1), msg)),
    );
    lines
}

pub fn print_validation(path: &Path, report: &ValidationReport) {
    for line in format_validation(path, report) {
        println!("{}", line);
    }
}

// ============================================================================
// inspect
// ============================================================================

/// Format the manifest, form schema and asset inventory of a template.
///
/// `schema` is `None` when the schema JSON did not parse; the section list is
/// then replaced by a note.
pub fn format_inspect(
    archive: &TemplateArchive,
    schema: Option<&TemplateSchema>,
    editor: &EditorConfig,
) -> Vec<String> {
    let manifest = archive.info();
    let mut lines = vec![format!("{} {}", manifest.name, manifest.version)];
    lines.push(format!("{}Id: {}", indent(1), manifest.id));
    if let Some(author) = manifest.author.as_ref().and_then(|a| a.display_name()) {
        lines.push(format!("{}Author: {}", indent(1), author));
    }
    if let Some(category) = &manifest.category {
        lines.push(format!("{}Category: {}", indent(1), category));
    }
    if let Some(description) = &manifest.description {
        lines.push(format!(
            "{}Description: {}",
            indent(1),
            truncate_desc(description, DESCRIPTION_CHARS)
        ));
    }
    lines.push(format!(
        "{}Draft: {}",
        indent(1),
        if archive.is_draft() { "yes" } else { "no" }
    ));
    if archive.has_scripts() {
        lines.push(format!("{}Script: yes", indent(1)));
    }

    lines.push(String::new());
    lines.push("Sections".to_string());
    match schema {
        Some(schema) => {
            for (i, section) in schema.sections().iter().enumerate() {
                let title = if section.title.is_empty() {
                    &section.id
                } else {
                    &section.title
                };
                lines.push(format!("{} {}", format_index(i + 1), title));
                for field in &section.fields {
                    lines.push(format!("{}{}", indent(1), field_line(field, editor)));
                }
            }
        }
        None => lines.push(format!("{}(schema not understood)", indent(1))),
    }

    lines.push(String::new());
    lines.push(format!(
        "Assets ({}, {})",
        archive.assets.len(),
        format_bytes(archive.assets.total_bytes())
    ));
    for path in archive.assets.paths() {
        lines.push(format!("{}{}", indent(1), path));
    }
    lines
}

pub fn print_inspect(archive: &TemplateArchive, schema: Option<&TemplateSchema>, editor: &EditorConfig) {
    for line in format_inspect(archive, schema, editor) {
        println!("{}", line);
    }
}

// ============================================================================
// config
// ============================================================================

/// Pretty-printed config, one line per JSON line.
pub fn format_config(config: &Value) -> Vec<String> {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|_| config.to_string())
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn print_config(config: &Value) {
    for line in format_config(config) {
        println!("{}", line);
    }
}

// ============================================================================
// build / save / preview
// ============================================================================

/// Format a static build result.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = vec![format!("Built {}", report.output_path.display())];
    lines.push(format!("{}Assets: {}", indent(1), report.assets));
    for path in &report.extracted {
        lines.push(format!("{}Extracted: {}", indent(1), path));
    }
    if report.reused > 0 {
        lines.push(format!("{}Reused: {}", indent(1), report.reused));
    }
    for skipped in &report.skipped {
        lines.push(format!("{}Skipped: {}", indent(1), skipped));
    }
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

pub fn format_draft_saved(path: &Path) -> Vec<String> {
    vec![format!("Saved draft {}", path.display())]
}

pub fn print_draft_saved(path: &Path) {
    for line in format_draft_saved(path) {
        println!("{}", line);
    }
}

pub fn format_preview_written(path: &Path, bytes: usize) -> Vec<String> {
    vec![format!("Preview {} ({})", path.display(), format_bytes(bytes))]
}

pub fn print_preview_written(path: &Path, bytes: usize) {
    for line in format_preview_written(path, bytes) {
        println!("{}", line);
    }
}
