//! Shared test utilities for the dlp-builder test suite.
//!
//! Builds template archives in memory so codec, export and session tests
//! never depend on fixture files on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let bytes = ZipFixture::minimal()
//!     .file("assets/logo.png", b"PNG")
//!     .text("script.js", "init()")
//!     .finish();
//! let archive = crate::codec::load(&bytes).unwrap();
//! ```

use crate::archive::TemplateArchive;
use crate::assets::AssetCollection;
use serde_json::{Value, json};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

// =========================================================================
// Fixture content
// =========================================================================

pub fn sample_manifest_json() -> Value {
    json!({"id": "sample", "name": "Sample Template", "version": "1.0.0"})
}

pub fn sample_schema_json() -> Value {
    json!({
        "formSchema": {
            "sections": [{
                "id": "basic",
                "title": "Basic",
                "fields": [
                    {"id": "title", "type": "text", "label": "Title"}
                ]
            }]
        }
    })
}

pub fn sample_default_config() -> Value {
    json!({"title": "A"})
}

pub const SAMPLE_TEMPLATE: &str = "<h1>{{title}}</h1>";
pub const SAMPLE_STYLES: &str = "h1 { color: red; }";

/// Members of the minimal valid archive, in write order.
fn minimal_entries(prefix: &str) -> Vec<(String, Vec<u8>)> {
    let json_bytes = |value: Value| serde_json::to_vec_pretty(&value).unwrap();
    vec![
        (format!("{prefix}manifest.json"), json_bytes(sample_manifest_json())),
        (format!("{prefix}schema.json"), json_bytes(sample_schema_json())),
        (
            format!("{prefix}config.default.json"),
            json_bytes(sample_default_config()),
        ),
        (format!("{prefix}index.html"), SAMPLE_TEMPLATE.as_bytes().to_vec()),
        (format!("{prefix}style.css"), SAMPLE_STYLES.as_bytes().to_vec()),
    ]
}

// =========================================================================
// In-memory ZIP builder
// =========================================================================

/// Chainable builder for ZIP archives held in memory.
///
/// Entries are written in the order they are added.
#[derive(Debug, Default)]
pub struct ZipFixture {
    entries: Vec<(String, Vec<u8>)>,
}

impl ZipFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// The minimal loadable template (`sample`, `{"title":"A"}`, no script).
    pub fn minimal() -> Self {
        Self::minimal_in("")
    }

    /// The minimal template with every member under `prefix`.
    pub fn minimal_in(prefix: &str) -> Self {
        Self {
            entries: minimal_entries(prefix),
        }
    }

    pub fn minimal_without_manifest() -> Self {
        Self::minimal_without("manifest.json")
    }

    /// The minimal template minus the member named `name`.
    pub fn minimal_without(name: &str) -> Self {
        let mut fixture = Self::minimal();
        fixture.entries.retain(|(entry, _)| entry != name);
        fixture
    }

    pub fn json(self, name: &str, value: &Value) -> Self {
        self.file(name, &serde_json::to_vec_pretty(value).unwrap())
    }

    pub fn text(self, name: &str, content: &str) -> Self {
        self.file(name, content.as_bytes())
    }

    pub fn file(mut self, name: &str, bytes: &[u8]) -> Self {
        self.entries.push((name.to_string(), bytes.to_vec()));
        self
    }

    pub fn finish(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, bytes) in &self.entries {
            writer.start_file(name.as_str(), options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Write the archive to `dir/name` and return the path.
    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.finish()).unwrap();
        path
    }
}

pub fn minimal_archive_bytes() -> Vec<u8> {
    ZipFixture::minimal().finish()
}

// =========================================================================
// In-memory archives
// =========================================================================

/// The minimal template as a [`TemplateArchive`], without going through ZIP.
pub fn sample_archive() -> TemplateArchive {
    TemplateArchive {
        file_path: None,
        manifest: sample_manifest_json(),
        schema: sample_schema_json(),
        default_config: sample_default_config(),
        user_config: None,
        template: SAMPLE_TEMPLATE.to_string(),
        styles: SAMPLE_STYLES.to_string(),
        scripts: String::new(),
        assets: AssetCollection::new(),
        metadata: None,
    }
}

/// [`sample_archive`] with different markup, styles and assets.
pub fn archive_with(template: &str, styles: &str, assets: &[(&str, &[u8])]) -> TemplateArchive {
    let mut archive = sample_archive();
    archive.template = template.to_string();
    archive.styles = styles.to_string();
    archive.assets = assets
        .iter()
        .map(|(path, bytes)| (path.to_string(), bytes.to_vec()))
        .collect();
    archive
}

/// Read every member of ZIP bytes into `(name, bytes)` pairs, in archive order.
pub fn read_zip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;
    let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index(i).unwrap();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            (entry.name().to_string(), content)
        })
        .collect()
}

/// Text content of one member of ZIP bytes.
pub fn zip_text(bytes: &[u8], name: &str) -> String {
    let (_, content) = read_zip(bytes)
        .into_iter()
        .find(|(entry, _)| entry == name)
        .unwrap_or_else(|| panic!("{name} not in archive"));
    String::from_utf8(content).unwrap()
}
