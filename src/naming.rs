//! Centralized naming for everything the builder writes.
//!
//! ## Inline assets
//!
//! Data URIs extracted during static export are stored as
//! `assets/<prefix>-<kind>-<n>.<ext>`, where `kind` is the top-level MIME
//! type and `n` counts from 1 per kind:
//! - `data:image/png;base64,...` → `assets/inline-image-1.png`
//! - `data:font/woff2;base64,...` → `assets/inline-font-1.bin`
//! - `data:;base64,...` → `assets/inline-data-1.bin`
//!
//! ## Output archives
//!
//! Extensions are appended, never substituted:
//! - static site `out/site` → `out/site.zip`, `out/site.zip` unchanged
//! - draft `drafts/lp` → `drafts/lp.dlpt`, `lp.zip` and `lp.dlpt` unchanged
//! - default draft name for template `summer-lp` → `summer-lp_draft.dlpt`

use crate::assets::{ASSET_DIR, extension_for_mime};
use std::path::{Path, PathBuf};

/// Extension of draft saves.
pub const DRAFT_EXTENSION: &str = "dlpt";
/// Extension of static site exports.
pub const SITE_EXTENSION: &str = "zip";

/// Kind segment of an inline asset name: the MIME top-level type.
pub fn inline_kind(mime: &str) -> String {
    let top = mime.split('/').next().unwrap_or("").trim();
    if top.is_empty() {
        "data".to_string()
    } else {
        top.to_ascii_lowercase()
    }
}

/// Storage path of the `n`th extracted inline asset of a MIME type.
pub fn inline_asset_name(prefix: &str, mime: &str, n: usize) -> String {
    format!(
        "{ASSET_DIR}/{prefix}-{}-{n}.{}",
        inline_kind(mime),
        extension_for_mime(mime)
    )
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| allowed.contains(&ext.as_str()))
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Destination of a static site export: `.zip` appended when missing.
pub fn site_output_path(dest: &Path) -> PathBuf {
    if has_extension(dest, &[SITE_EXTENSION]) {
        dest.to_path_buf()
    } else {
        append_extension(dest, SITE_EXTENSION)
    }
}

/// Destination of a draft save: `.dlpt` appended unless it already ends
/// in `.dlpt` or `.zip`.
pub fn draft_output_path(dest: &Path) -> PathBuf {
    if has_extension(dest, &[DRAFT_EXTENSION, SITE_EXTENSION]) {
        dest.to_path_buf()
    } else {
        append_extension(dest, DRAFT_EXTENSION)
    }
}

/// Suggested file name of a draft of template `id`.
pub fn default_draft_name(id: &str) -> String {
    let id = id.trim();
    let stem = if id.is_empty() { "template" } else { id };
    format!("{stem}_draft.{DRAFT_EXTENSION}")
}
