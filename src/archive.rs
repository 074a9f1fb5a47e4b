//! In-memory template archive.
//!
//! A [`TemplateArchive`] is what [`codec::load`](crate::codec::load) produces
//! from a `.dlpt`/`.zip` file. It is a plain data holder: the only rule that
//! lives here is which configuration is *effective*.
//!
//! ```text
//! userConfig present and non-empty  →  userConfig
//! otherwise                         →  defaultConfig
//! ```
//!
//! Markup, styles, scripts and assets are read-only after load. Only the
//! config and metadata fields are ever replaced, and the render/export stages
//! always work on copies of the text.

use crate::assets::AssetCollection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Value of `type` in the metadata of every draft save.
pub const DRAFT_TYPE: &str = "work-in-progress";

/// Version of the draft metadata record.
pub const METADATA_VERSION: &str = "1.0.0";

/// Typed view of a template's identity record (`manifest.json` /
/// `template.json`).
///
/// The archive keeps the manifest JSON itself and writes it back verbatim;
/// this view is derived from it on demand and never fails. Scalar fields that
/// are not strings (`"version": 1`) are shown in their JSON form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub author: Option<Author>,
}

impl Manifest {
    pub fn from_value(value: &Value) -> Self {
        Self {
            id: scalar_text(value.get("id")).unwrap_or_default(),
            name: scalar_text(value.get("name")).unwrap_or_default(),
            version: scalar_text(value.get("version")).unwrap_or_default(),
            description: scalar_text(value.get("description")),
            category: scalar_text(value.get("category")),
            author: value.get("author").and_then(Author::from_value),
        }
    }
}

/// Template author: either a structured record or a plain string.
#[derive(Debug, Clone, PartialEq)]
pub enum Author {
    Named {
        name: Option<String>,
        url: Option<String>,
    },
    Plain(String),
}

impl Author {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(name) => Some(Author::Plain(name.clone())),
            Value::Object(record) => Some(Author::Named {
                name: scalar_text(record.get("name")),
                url: scalar_text(record.get("url")),
            }),
            _ => None,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            Author::Named { name, .. } => name.as_deref(),
            Author::Plain(name) => Some(name),
        }
    }
}

fn scalar_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Metadata attached to draft saves (`.dlpt-metadata.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetadata {
    pub version: String,
    pub saved_at: String,
    pub builder_version: String,
    pub template_id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl BuildMetadata {
    /// Metadata for a draft of `manifest` saved right now.
    pub fn draft(manifest: &Manifest) -> Self {
        Self {
            version: METADATA_VERSION.to_string(),
            saved_at: chrono::Utc::now().to_rfc3339(),
            builder_version: env!("CARGO_PKG_VERSION").to_string(),
            template_id: manifest.id.clone(),
            kind: DRAFT_TYPE.to_string(),
        }
    }

    /// Interpret a loaded metadata value, if it has the draft shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// A loaded template.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateArchive {
    /// Source file, when loaded from disk.
    pub file_path: Option<PathBuf>,
    /// Manifest JSON, carried verbatim. See [`TemplateArchive::info`].
    pub manifest: Value,
    /// Form schema JSON, carried verbatim. See [`crate::schema`] for the typed view.
    pub schema: Value,
    pub default_config: Value,
    /// Present only in previously saved drafts.
    pub user_config: Option<Value>,
    /// Handlebars markup.
    pub template: String,
    pub styles: String,
    /// Empty when the archive ships no `script.js`.
    pub scripts: String,
    pub assets: AssetCollection,
    pub metadata: Option<Value>,
}

impl TemplateArchive {
    /// Typed view of the manifest.
    pub fn info(&self) -> Manifest {
        Manifest::from_value(&self.manifest)
    }

    /// The configuration rendering should start from.
    pub fn effective_config(&self) -> &Value {
        match &self.user_config {
            Some(user) if !is_empty_config(user) => user,
            _ => &self.default_config,
        }
    }

    /// Whether this archive is a previously saved draft.
    pub fn is_draft(&self) -> bool {
        self.user_config.is_some()
            || self
                .metadata
                .as_ref()
                .and_then(BuildMetadata::from_value)
                .is_some_and(|m| m.kind == DRAFT_TYPE)
    }

    /// Replace the user config, returning the previous one.
    pub fn replace_user_config(&mut self, config: Value) -> Option<Value> {
        self.user_config.replace(config)
    }

    /// Whether the script has any content worth running.
    pub fn has_scripts(&self) -> bool {
        !self.scripts.trim().is_empty()
    }
}

fn is_empty_config(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
