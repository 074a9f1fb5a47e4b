//! Binary assets carried by a template archive.
//!
//! Every member of an archive that is not one of the well-known roles
//! (manifest, schema, configs, markup, styles, scripts) ends up here, keyed by
//! its archive-relative path. The collection is owned by the
//! [`TemplateArchive`](crate::archive::TemplateArchive); the render and export
//! stages only borrow it to compute rewritten text and never touch the bytes.
//!
//! ## Content addressing
//!
//! Assets are identified by the SHA-256 of their bytes in two places:
//!
//! - **Blob handles** for interactive preview: `blob:dlp-builder/<16 hex>`.
//!   The same bytes always produce the same handle, so a host can cache them.
//! - **The content index** used by static export to recognise an inlined
//!   data URI that is byte-identical to an asset already in the archive.
//!
//! ## Path normalization
//!
//! Static export stores every asset under `assets/`. [`normalize_asset_path`]
//! turns whatever path the template author used into that canonical form:
//!
//! ```text
//! C:\images\a.png          → assets/images/a.png
//! /images/a.png            → assets/images/a.png
//! images/../images/a.png   → assets/images/a.png
//! assets/images/a.png      → assets/images/a.png
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Directory every exported asset lives under.
pub const ASSET_DIR: &str = "assets";

/// Scheme prefix of preview blob handles.
const BLOB_PREFIX: &str = "blob:dlp-builder/";

/// Archive-relative path → bytes, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetCollection {
    entries: BTreeMap<String, Vec<u8>>,
}

impl AssetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an asset. Backslashes in the key become forward slashes.
    /// Returns the previous bytes if the key was already present.
    pub fn insert(&mut self, path: impl Into<String>, bytes: Vec<u8>) -> Option<Vec<u8>> {
        let key = path.into().replace('\\', "/");
        self.entries.insert(key, bytes)
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(path, bytes)| (path.as_str(), bytes.as_slice()))
    }

    /// Total size of all asset bytes.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Content hash → archive path, computed in parallel.
    ///
    /// When two assets share identical bytes the lexicographically first
    /// path wins, so the index is deterministic.
    pub fn content_index(&self) -> HashMap<String, String> {
        let hashed: Vec<(String, String)> = self
            .entries
            .par_iter()
            .map(|(path, bytes)| (hash_bytes(bytes), path.clone()))
            .collect();

        let mut index = HashMap::with_capacity(hashed.len());
        for (hash, path) in hashed {
            index
                .entry(hash)
                .and_modify(|existing: &mut String| {
                    if path < *existing {
                        *existing = path.clone();
                    }
                })
                .or_insert(path);
        }
        index
    }

    /// Preview blob handle for the asset at `path`.
    pub fn blob_handle(&self, path: &str) -> Option<String> {
        self.get(path).map(blob_handle)
    }

    /// Every blob handle mapped back to the asset path it stands for.
    pub fn blob_handles(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(path, bytes)| (blob_handle(bytes), path.clone()))
            .collect()
    }
}

impl FromIterator<(String, Vec<u8>)> for AssetCollection {
    fn from_iter<T: IntoIterator<Item = (String, Vec<u8>)>>(iter: T) -> Self {
        let mut assets = Self::new();
        for (path, bytes) in iter {
            assets.insert(path, bytes);
        }
        assets
    }
}

/// SHA-256 of a byte slice, as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Content-addressed preview handle for a buffer.
pub fn blob_handle(bytes: &[u8]) -> String {
    let hash = hash_bytes(bytes);
    format!("{BLOB_PREFIX}{}", &hash[..16])
}

/// MIME type for a file path, guessed from its extension.
///
/// Only the image types templates actually ship are known; everything else
/// is `application/octet-stream`.
pub fn mime_for_path(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// File extension used when an inlined payload of `mime` is extracted.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/webp" => "webp",
        "image/x-icon" => "ico",
        _ => "bin",
    }
}

/// `data:<mime>;base64,<payload>` for a buffer.
pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(bytes))
}

/// Decode a base64 data URI payload.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    BASE64.decode(payload.trim())
}

/// Canonical storage path for an asset in a static export.
///
/// Converts backslashes, strips a drive letter and leading slashes, resolves
/// `.` and `..` segments (never climbing above the root) and prefixes the
/// result with `assets/` unless it already starts there. Returns `None` when
/// nothing is left of the path.
pub fn normalize_asset_path(path: &str) -> Option<String> {
    let unified = path.replace('\\', "/");
    let without_drive = strip_drive_letter(&unified);

    let mut segments: Vec<&str> = Vec::new();
    for segment in without_drive.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return None;
    }
    if segments[0] != ASSET_DIR {
        segments.insert(0, ASSET_DIR);
    }
    if segments.len() == 1 {
        // Only the bare `assets` directory survived.
        return None;
    }
    Some(segments.join("/"))
}

fn strip_drive_letter(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        &path[2..]
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Path normalization
    // =========================================================================

    #[test]
    fn normalize_windows_drive_path() {
        assert_eq!(
            normalize_asset_path("C:\\images\\a.png").as_deref(),
            Some("assets/images/a.png")
        );
    }

    #[test]
    fn normalize_absolute_path() {
        assert_eq!(
            normalize_asset_path("/images/a.png").as_deref(),
            Some("assets/images/a.png")
        );
    }

    #[test]
    fn normalize_collapses_dot_dot() {
        assert_eq!(
            normalize_asset_path("images/../images/a.png").as_deref(),
            Some("assets/images/a.png")
        );
    }

    #[test]
    fn normalize_plain_relative_path() {
        assert_eq!(
            normalize_asset_path("images/a.png").as_deref(),
            Some("assets/images/a.png")
        );
    }

    #[test]
    fn normalize_keeps_existing_assets_prefix() {
        assert_eq!(
            normalize_asset_path("assets/logo.png").as_deref(),
            Some("assets/logo.png")
        );
        assert_eq!(
            normalize_asset_path("./assets//logo.png").as_deref(),
            Some("assets/logo.png")
        );
    }

    #[test]
    fn normalize_cannot_escape_root() {
        assert_eq!(
            normalize_asset_path("../../etc/passwd").as_deref(),
            Some("assets/etc/passwd")
        );
    }

    #[test]
    fn normalize_empty_results_are_none() {
        assert_eq!(normalize_asset_path(""), None);
        assert_eq!(normalize_asset_path("/"), None);
        assert_eq!(normalize_asset_path("a/.."), None);
        assert_eq!(normalize_asset_path("assets/"), None);
    }

    // =========================================================================
    // MIME tables
    // =========================================================================

    #[test]
    fn mime_for_known_extensions() {
        assert_eq!(mime_for_path("assets/a.PNG"), "image/png");
        assert_eq!(mime_for_path("a.jpeg"), "image/jpeg");
        assert_eq!(mime_for_path("a.jpg"), "image/jpeg");
        assert_eq!(mime_for_path("icons/fav.ico"), "image/x-icon");
        assert_eq!(mime_for_path("font.woff2"), "application/octet-stream");
        assert_eq!(mime_for_path("README"), "application/octet-stream");
    }

    #[test]
    fn extension_for_known_mimes() {
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/svg+xml"), "svg");
        assert_eq!(extension_for_mime("image/x-icon"), "ico");
        assert_eq!(extension_for_mime("font/woff2"), "bin");
    }

    // =========================================================================
    // Collection + hashing
    // =========================================================================

    #[test]
    fn insert_converts_backslashes() {
        let mut assets = AssetCollection::new();
        assets.insert("images\\logo.png", vec![1, 2, 3]);
        assert!(assets.contains("images/logo.png"));
        assert_eq!(assets.total_bytes(), 3);
    }

    #[test]
    fn hash_is_sha256_hex() {
        let h = hash_bytes(b"hello world");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_bytes(b"hello world"));
        assert_ne!(h, hash_bytes(b"hello world!"));
    }

    #[test]
    fn content_index_maps_hash_to_path() {
        let assets: AssetCollection = [
            ("assets/a.png".to_string(), b"AAA".to_vec()),
            ("assets/b.png".to_string(), b"BBB".to_vec()),
        ]
        .into_iter()
        .collect();

        let index = assets.content_index();
        assert_eq!(index.len(), 2);
        assert_eq!(index[&hash_bytes(b"AAA")], "assets/a.png");
        assert_eq!(index[&hash_bytes(b"BBB")], "assets/b.png");
    }

    #[test]
    fn content_index_prefers_first_path_for_duplicates() {
        let assets: AssetCollection = [
            ("assets/z.png".to_string(), b"same".to_vec()),
            ("assets/a.png".to_string(), b"same".to_vec()),
        ]
        .into_iter()
        .collect();

        let index = assets.content_index();
        assert_eq!(index.len(), 1);
        assert_eq!(index[&hash_bytes(b"same")], "assets/a.png");
    }

    #[test]
    fn blob_handles_are_content_addressed() {
        let assets: AssetCollection = [
            ("assets/a.png".to_string(), b"AAA".to_vec()),
            ("other/a.png".to_string(), b"AAA".to_vec()),
        ]
        .into_iter()
        .collect();

        let a = assets.blob_handle("assets/a.png").unwrap();
        assert!(a.starts_with("blob:dlp-builder/"));
        assert_eq!(a.len(), "blob:dlp-builder/".len() + 16);
        assert_eq!(Some(a), assets.blob_handle("other/a.png"));
        assert_eq!(assets.blob_handle("missing.png"), None);
    }

    #[test]
    fn blob_handles_map_back_to_paths() {
        let assets: AssetCollection = [
            ("assets/a.png".to_string(), b"AAA".to_vec()),
            ("assets/b.png".to_string(), b"BBB".to_vec()),
        ]
        .into_iter()
        .collect();

        let handles = assets.blob_handles();
        assert_eq!(handles.len(), 2);
        let a = assets.blob_handle("assets/a.png").unwrap();
        assert_eq!(handles[&a], "assets/a.png");
        assert!(handles.keys().all(|h| h.starts_with("blob:dlp-builder/")));
    }

    #[test]
    fn data_uri_roundtrips_through_decode() {
        let uri = data_uri("image/png", b"\x89PNG");
        assert_eq!(uri, "data:image/png;base64,iVBORw==");
        let payload = uri.split_once(',').unwrap().1;
        assert_eq!(decode_payload(payload).unwrap(), b"\x89PNG");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_payload("not*base64").is_err());
    }
}
