//! Inline data-URI extraction for static export.
//!
//! A user who picks an image in the editor stores it in the config as a
//! `data:<mime>;base64,<payload>` string, so it ends up inlined in the
//! rendered page. Static export turns each one back into a file:
//!
//! ```text
//! payload seen before in this export?  → same path as last time
//! decoded bytes equal an archive asset? → that asset's export path (reused)
//! otherwise                             → assets/<prefix>-<kind>-<n>.<ext> (extracted)
//! payload does not decode               → left inline, recorded as skipped
//! ```
//!
//! The same pass also relocates references to archive assets whose export
//! path differs from their archive path (`images/a.png` is exported as
//! `assets/images/a.png`). References already written in export form are
//! matched as themselves first, so they are not relocated twice.

use crate::assets::{AssetCollection, decode_payload, hash_bytes};
use crate::naming::inline_asset_name;
use crate::render::literal_alternation;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Padding may arrive HTML-escaped from `{{value}}` interpolation.
const DATA_URI: &str = r"data:(?P<mime>[A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+)?;base64,(?P<payload>[A-Za-z0-9+/]+(?:=|&#x3D;|&#61;){0,2})";

/// An inline payload that could not be extracted. Export continues without it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Skipped inline {mime} asset: {reason}")]
pub struct SkippedAsset {
    pub mime: String,
    pub reason: String,
}

/// Outcome of extraction across every text passed through the extractor.
#[derive(Debug, Default)]
pub struct Extraction {
    /// New files, in extraction order.
    pub extracted: Vec<(String, Vec<u8>)>,
    /// Distinct payloads resolved to an existing archive asset.
    pub reused: usize,
    pub skipped: Vec<SkippedAsset>,
    /// Distinct payloads seen.
    pub candidates: usize,
}

impl Extraction {
    /// True when there were inline payloads and none of them decoded.
    pub fn all_failed(&self) -> bool {
        self.candidates > 0 && self.skipped.len() == self.candidates
    }
}

/// Rewrites rendered text for static export.
pub struct InlineExtractor {
    pattern: Regex,
    relocations: HashMap<String, String>,
    state: ExtractState,
}

struct ExtractState {
    prefix: String,
    /// Content hash → export path of archive assets.
    known: HashMap<String, String>,
    /// Content hash → export path of files extracted so far.
    extracted_by_hash: HashMap<String, String>,
    /// Export paths already in use.
    taken: HashSet<String>,
    counters: HashMap<String, usize>,
    /// Hash of mime + payload → export path, or `None` if it failed to decode.
    memo: HashMap<String, Option<String>>,
    out: Extraction,
}

impl InlineExtractor {
    /// `placement` maps archive asset paths to their export paths.
    pub fn new(
        assets: &AssetCollection,
        placement: &BTreeMap<String, String>,
        prefix: &str,
    ) -> Result<Self, regex::Error> {
        let known = assets
            .content_index()
            .into_iter()
            .filter_map(|(hash, path)| placement.get(&path).map(|dest| (hash, dest.clone())))
            .collect();

        let mut relocations = HashMap::new();
        for (from, to) in placement {
            if from != to {
                relocations.insert(from.clone(), to.clone());
            }
            relocations.insert(to.clone(), to.clone());
        }

        let source = if relocations.is_empty() {
            format!("(?P<uri>{DATA_URI})")
        } else {
            format!(
                "(?P<uri>{DATA_URI})|{}",
                literal_alternation(relocations.keys().map(String::as_str))
            )
        };

        Ok(Self {
            pattern: Regex::new(&source)?,
            relocations,
            state: ExtractState {
                prefix: prefix.to_string(),
                known,
                extracted_by_hash: HashMap::new(),
                taken: placement.values().cloned().collect(),
                counters: HashMap::new(),
                memo: HashMap::new(),
                out: Extraction::default(),
            },
        })
    }

    /// Rewrite one text (rendered HTML or CSS).
    pub fn rewrite(&mut self, text: &str) -> String {
        self.pattern
            .replace_all(text, |caps: &Captures| {
                if caps.name("uri").is_some() {
                    let mime = caps.name("mime").map_or("", |m| m.as_str());
                    let payload = caps
                        .name("payload")
                        .map_or(String::new(), |m| unescape_padding(m.as_str()));
                    self.state
                        .resolve(mime, &payload)
                        .unwrap_or_else(|| caps[0].to_string())
                } else {
                    self.relocations
                        .get(&caps[0])
                        .cloned()
                        .unwrap_or_else(|| caps[0].to_string())
                }
            })
            .into_owned()
    }

    pub fn finish(self) -> Extraction {
        self.state.out
    }
}

impl ExtractState {
    fn resolve(&mut self, mime: &str, payload: &str) -> Option<String> {
        let key = memo_key(mime, payload);
        if let Some(known) = self.memo.get(&key) {
            return known.clone();
        }
        self.out.candidates += 1;

        let resolved = match decode_payload(payload) {
            Ok(bytes) => Some(self.place(mime, bytes)),
            Err(e) => {
                tracing::warn!(target: "export", mime, error = %e, "Inline asset does not decode");
                self.out.skipped.push(SkippedAsset {
                    mime: mime.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        };
        self.memo.insert(key, resolved.clone());
        resolved
    }

    fn place(&mut self, mime: &str, bytes: Vec<u8>) -> String {
        let hash = hash_bytes(&bytes);
        if let Some(existing) = self.known.get(&hash) {
            tracing::debug!(target: "export", path = %existing, "Inline asset matches archive asset");
            self.out.reused += 1;
            return existing.clone();
        }
        if let Some(existing) = self.extracted_by_hash.get(&hash) {
            return existing.clone();
        }

        let path = self.next_name(mime);
        tracing::debug!(target: "export", path = %path, bytes = bytes.len(), "Extracted inline asset");
        self.taken.insert(path.clone());
        self.extracted_by_hash.insert(hash, path.clone());
        self.out.extracted.push((path.clone(), bytes));
        path
    }

    fn next_name(&mut self, mime: &str) -> String {
        let counter = self
            .counters
            .entry(crate::naming::inline_kind(mime))
            .or_insert(0);
        loop {
            *counter += 1;
            let name = inline_asset_name(&self.prefix, mime, *counter);
            if !self.taken.contains(&name) {
                return name;
            }
        }
    }
}

fn unescape_padding(payload: &str) -> String {
    payload.replace("&#x3D;", "=").replace("&#61;", "=")
}

fn memo_key(mime: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mime.as_bytes());
    hasher.update(b";");
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::data_uri;

    fn extractor(assets: &[(&str, &[u8])]) -> InlineExtractor {
        let collection: AssetCollection = assets
            .iter()
            .map(|(p, b)| (p.to_string(), b.to_vec()))
            .collect();
        let placement = collection
            .paths()
            .map(|p| {
                let dest = crate::assets::normalize_asset_path(p).unwrap();
                (p.to_string(), dest)
            })
            .collect();
        InlineExtractor::new(&collection, &placement, "inline").unwrap()
    }

    #[test]
    fn matching_payload_reuses_archive_asset() {
        let mut ex = extractor(&[("assets/logo.png", b"LOGO")]);
        let html = format!("<img src=\"{}\">", data_uri("image/png", b"LOGO"));
        assert_eq!(ex.rewrite(&html), "<img src=\"assets/logo.png\">");
        let out = ex.finish();
        assert!(out.extracted.is_empty());
        assert_eq!(out.reused, 1);
    }

    #[test]
    fn new_payload_is_extracted_once() {
        let mut ex = extractor(&[]);
        let uri = data_uri("image/png", b"NEW");
        let html = format!("<img src=\"{uri}\"><img src=\"{uri}\">");
        let css = format!(".a {{ background: url({uri}); }}");

        assert_eq!(
            ex.rewrite(&html),
            "<img src=\"assets/inline-image-1.png\"><img src=\"assets/inline-image-1.png\">"
        );
        assert_eq!(ex.rewrite(&css), ".a { background: url(assets/inline-image-1.png); }");

        let out = ex.finish();
        assert_eq!(out.extracted, vec![("assets/inline-image-1.png".to_string(), b"NEW".to_vec())]);
        assert_eq!(out.candidates, 1);
    }

    #[test]
    fn numbering_is_per_kind() {
        let mut ex = extractor(&[]);
        let text = format!(
            "{} {} {}",
            data_uri("image/png", b"one"),
            data_uri("image/jpeg", b"two"),
            data_uri("font/woff2", b"three"),
        );
        assert_eq!(
            ex.rewrite(&text),
            "assets/inline-image-1.png assets/inline-image-2.jpg assets/inline-font-1.bin"
        );
    }

    #[test]
    fn numbering_skips_taken_names() {
        let mut ex = extractor(&[("assets/inline-image-1.png", b"OLD")]);
        let text = data_uri("image/png", b"NEW");
        assert_eq!(ex.rewrite(&text), "assets/inline-image-2.png");
    }

    #[test]
    fn same_bytes_under_other_mime_share_file() {
        let mut ex = extractor(&[]);
        let text = format!(
            "{} {}",
            data_uri("image/png", b"X"),
            data_uri("application/octet-stream", b"X")
        );
        assert_eq!(
            ex.rewrite(&text),
            "assets/inline-image-1.png assets/inline-image-1.png"
        );
        assert_eq!(ex.finish().extracted.len(), 1);
    }

    #[test]
    fn undecodable_payload_is_skipped() {
        let mut ex = extractor(&[]);
        // Valid alphabet, invalid length.
        let text = "url(data:image/png;base64,A)";
        assert_eq!(ex.rewrite(text), text);
        let out = ex.finish();
        assert_eq!(out.skipped.len(), 1);
        assert!(out.all_failed());
    }

    #[test]
    fn partial_failure_is_not_all_failed() {
        let mut ex = extractor(&[]);
        let text = format!("data:image/png;base64,A {}", data_uri("image/png", b"ok"));
        ex.rewrite(&text);
        let out = ex.finish();
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.extracted.len(), 1);
        assert!(!out.all_failed());
    }

    #[test]
    fn references_are_relocated_once() {
        let mut ex = extractor(&[("images/hero.jpg", b"JPG")]);
        assert_eq!(
            ex.rewrite("<img src=\"images/hero.jpg\"><img src=\"assets/images/hero.jpg\">"),
            "<img src=\"assets/images/hero.jpg\"><img src=\"assets/images/hero.jpg\">"
        );
    }

    #[test]
    fn escaped_padding_is_understood() {
        let mut ex = extractor(&[("assets/a.png", b"LOGO")]);
        let escaped = data_uri("image/png", b"LOGO").replace('=', "&#x3D;");
        assert!(escaped.ends_with("&#x3D;&#x3D;"));
        assert_eq!(ex.rewrite(&escaped), "assets/a.png");
    }

    #[test]
    fn text_without_references_is_unchanged() {
        let mut ex = extractor(&[]);
        assert_eq!(ex.rewrite("<p>plain</p>"), "<p>plain</p>");
        assert!(!ex.finish().all_failed());
    }
}
