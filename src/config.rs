//! Builder settings.
//!
//! Handles loading, validating, and merging `dlp-builder.toml`. These are the
//! settings of the builder itself (debounce intervals, preview asset mode,
//! export compression), not the per-template configuration a user edits,
//! which lives in [`crate::patch`].
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [editor]
//! slider_debounce_ms = 100  # Quiet period before a slider drag is committed
//! color_debounce_ms = 100   # Same for color pickers
//!
//! [preview]
//! render_debounce_ms = 150  # Coalesce re-renders closer together than this
//! asset_mode = "blob"       # "blob" handles or "data-uri" (offline preview)
//! lang = "ja"               # lang attribute of the preview document
//!
//! [export]
//! compression = "deflated"  # or "stored"
//! inline_prefix = "inline"  # assets/<prefix>-<kind>-<n>.<ext>
//!
//! [logging]
//! level = "info"            # error | warn | info | debug | trace
//! ```
//!
//! ## Partial Configuration
//!
//! Settings files are sparse: override just the values you want. The user
//! file is merged on top of the stock defaults, then deserialized and
//! validated. Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File name looked up when no explicit settings path is given.
pub const SETTINGS_FILE: &str = "dlp-builder.toml";

/// Upper bound for every debounce interval.
const MAX_DEBOUNCE_MS: u64 = 5000;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Builder settings loaded from `dlp-builder.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderConfig {
    /// Form editor behaviour.
    pub editor: EditorConfig,
    /// Live preview behaviour.
    pub preview: PreviewConfig,
    /// Static export and draft save.
    pub export: ExportConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl BuilderConfig {
    /// Validate values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("editor.slider_debounce_ms", self.editor.slider_debounce_ms),
            ("editor.color_debounce_ms", self.editor.color_debounce_ms),
            ("preview.render_debounce_ms", self.preview.render_debounce_ms),
        ] {
            if value > MAX_DEBOUNCE_MS {
                return Err(ConfigError::Validation(format!(
                    "{key} must be at most {MAX_DEBOUNCE_MS}"
                )));
            }
        }
        let prefix = &self.export.inline_prefix;
        if prefix.is_empty()
            || !prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Validation(
                "export.inline_prefix must be non-empty and use only a-z, 0-9 and '-'".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Form editor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EditorConfig {
    /// Quiet period before a slider value is committed to the config.
    pub slider_debounce_ms: u64,
    /// Quiet period before a color picker value is committed.
    pub color_debounce_ms: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            slider_debounce_ms: 100,
            color_debounce_ms: 100,
        }
    }
}

impl EditorConfig {
    pub fn slider_debounce(&self) -> Duration {
        Duration::from_millis(self.slider_debounce_ms)
    }

    pub fn color_debounce(&self) -> Duration {
        Duration::from_millis(self.color_debounce_ms)
    }
}

/// How the preview refers to archive assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetMode {
    /// Content-addressed blob handles served by the host.
    #[default]
    Blob,
    /// Self-contained base64 data URIs.
    DataUri,
}

/// Live preview settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreviewConfig {
    /// Re-render requests closer together than this are coalesced.
    pub render_debounce_ms: u64,
    /// Asset reference mode for the interactive preview.
    pub asset_mode: AssetMode,
    /// `lang` attribute of the preview document.
    pub lang: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            render_debounce_ms: 150,
            asset_mode: AssetMode::Blob,
            lang: "ja".to_string(),
        }
    }
}

impl PreviewConfig {
    pub fn render_debounce(&self) -> Duration {
        Duration::from_millis(self.render_debounce_ms)
    }
}

/// ZIP compression for written archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

/// Export settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub compression: Compression,
    /// File name prefix of extracted inline assets.
    pub inline_prefix: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Deflated,
            inline_prefix: "inline".to_string(),
        }
    }
}

/// Log settings. `RUST_LOG` overrides `level` when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// =============================================================================
// Settings loading, merging, and validation
// =============================================================================

/// Returns the stock default settings as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(BuilderConfig::default()).expect("default settings must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<BuilderConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuilderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load settings from an explicit file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<BuilderConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    resolve_config(Some(value))
}

/// Load `dlp-builder.toml` from a directory, falling back to stock defaults
/// when the file does not exist.
pub fn load_config(dir: &Path) -> Result<BuilderConfig, ConfigError> {
    let path = dir.join(SETTINGS_FILE);
    if !path.exists() {
        return resolve_config(None);
    }
    load_config_file(&path)
}

/// Returns a fully-commented stock `dlp-builder.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Doujin LP Builder Settings
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Form editor
# ---------------------------------------------------------------------------
[editor]
# Slider drags are held in a local overlay and committed to the template
# config only after this many milliseconds without further movement.
slider_debounce_ms = 100

# Same quiet period for color pickers.
color_debounce_ms = 100

# ---------------------------------------------------------------------------
# Live preview
# ---------------------------------------------------------------------------
[preview]
# Re-render requests arriving closer together than this are coalesced.
render_debounce_ms = 150

# How the preview refers to template assets:
#   "blob"     - content-addressed handles (blob:dlp-builder/<hash>)
#   "data-uri" - inline base64, fully self-contained
asset_mode = "blob"

# lang attribute of the preview document.
lang = "ja"

# ---------------------------------------------------------------------------
# Export
# ---------------------------------------------------------------------------
[export]
# ZIP compression for static sites and drafts: "deflated" or "stored".
compression = "deflated"

# Inlined images found in the rendered page are extracted to
# assets/<inline_prefix>-<kind>-<n>.<ext>
inline_prefix = "inline"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# error | warn | info | debug | trace. RUST_LOG takes precedence when set.
level = "info"
"##
}
