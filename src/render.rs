//! Render pipeline: Handlebars markup + config → HTML.
//!
//! ## Stages
//!
//! ```text
//! markup ──compile──▶ CompiledTemplate ──render(config)──▶ html
//!                                                         │
//! styles ─────────────────────────────────────────────────┤
//!                                                         ▼
//!                                    AssetRewriter (blob | data-uri)
//!                                                         │
//!                                                         ▼
//!                                               Preview { html, css }
//! ```
//!
//! Compilation is cached inside a [`Renderer`] by the SHA-256 of the markup,
//! so re-rendering after a config edit only evaluates.
//!
//! ## Helpers
//!
//! | Helper | Kind | Behaviour |
//! |--------|------|-----------|
//! | `equals a b` | block | main block when `a` equals `b`, else `{{else}}` |
//! | `contains list item` | block | main block when `list` is an array holding `item` |
//! | `extractYouTubeID url` | inline | 11-character video id, or empty |
//!
//! ## Asset references
//!
//! Asset paths are substituted verbatim wherever they occur in the rendered
//! HTML and the CSS. All paths are matched in a single pass through one regex
//! alternation ordered longest first: a path that is a prefix of another
//! never wins over it, and substituted text is never scanned again.

use crate::archive::TemplateArchive;
use crate::assets::{AssetCollection, data_uri, hash_bytes, mime_for_path};
use crate::config::AssetMode;
use crate::patch::top_level_keys;
use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, Renderable,
};
use maud::{DOCTYPE, PreEscaped, html};
use regex::{Captures, Regex};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Characters of template source kept in a [`RenderError::Render`].
pub const SNIPPET_CHARS: usize = 500;

static NULL: Value = Value::Null;

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*(youtu.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*")
        .expect("YouTube pattern is valid")
});

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template syntax error: {0}")]
    Syntax(#[from] handlebars::TemplateError),
    #[error("Template render error: {message}")]
    Render {
        message: String,
        /// Start of the template source.
        snippet: String,
        /// Top-level keys of the config the template was rendered with.
        config_keys: Vec<String>,
    },
    #[error("Asset pattern error: {0}")]
    AssetPattern(#[from] regex::Error),
}

/// Video id from any common YouTube URL shape, or `""`.
///
/// ```text
/// https://youtu.be/dQw4w9WgXcQ                → dQw4w9WgXcQ
/// https://www.youtube.com/watch?v=dQw4w9WgXcQ → dQw4w9WgXcQ
/// https://www.youtube.com/embed/dQw4w9WgXcQ   → dQw4w9WgXcQ
/// https://example.com/no-video                → (empty)
/// ```
pub fn extract_youtube_id(url: &str) -> String {
    YOUTUBE_URL
        .captures(url)
        .and_then(|caps| caps.get(2))
        .map(|id| id.as_str())
        .filter(|id| id.chars().count() == 11)
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Helpers
// =============================================================================

/// Render the main block when `cond` holds, the `{{else}}` block otherwise.
fn render_branch<'reg: 'rc, 'rc>(
    cond: bool,
    h: &Helper<'rc>,
    r: &'reg Handlebars<'reg>,
    ctx: &'rc Context,
    rc: &mut RenderContext<'reg, 'rc>,
    out: &mut dyn Output,
) -> HelperResult {
    let branch = if cond { h.template() } else { h.inverse() };
    match branch {
        Some(t) => t.render(r, ctx, rc, out),
        None => Ok(()),
    }
}

fn param<'a>(h: &'a Helper<'_>, idx: usize) -> &'a Value {
    h.param(idx).map(|p| p.value()).unwrap_or(&NULL)
}

/// Strict equality, treating `1` and `1.0` as the same number.
fn json_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

struct EqualsHelper;

impl HelperDef for EqualsHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let cond = json_equals(param(h, 0), param(h, 1));
        render_branch(cond, h, r, ctx, rc, out)
    }
}

struct ContainsHelper;

impl HelperDef for ContainsHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let item = param(h, 1);
        let cond = param(h, 0)
            .as_array()
            .is_some_and(|items| items.iter().any(|v| json_equals(v, item)));
        render_branch(cond, h, r, ctx, rc, out)
    }
}

fn youtube_id_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let url = param(h, 0).as_str().unwrap_or("");
    out.write(&handlebars::html_escape(&extract_youtube_id(url)))?;
    Ok(())
}

// =============================================================================
// Compile + render
// =============================================================================

/// Handle to markup compiled into a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    name: String,
    snippet: String,
}

impl CompiledTemplate {
    /// Registry key: SHA-256 of the markup.
    pub fn key(&self) -> &str {
        &self.name
    }
}

/// Handlebars registry with the template helpers installed.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_helper("equals", Box::new(EqualsHelper));
        registry.register_helper("contains", Box::new(ContainsHelper));
        registry.register_helper("extractYouTubeID", Box::new(youtube_id_helper));
        Self { registry }
    }

    /// Compile `markup`, reusing an earlier compilation of the same text.
    pub fn compile(&mut self, markup: &str) -> Result<CompiledTemplate, RenderError> {
        let name = hash_bytes(markup.as_bytes());
        if !self.registry.has_template(&name) {
            self.registry
                .register_template_string(&name, markup)
                .inspect_err(|e| {
                    tracing::warn!(target: "render", error = %e, "Template failed to compile");
                })?;
            tracing::debug!(target: "render", key = &name[..12], bytes = markup.len(), "Template compiled");
        }
        Ok(CompiledTemplate {
            name,
            snippet: markup.chars().take(SNIPPET_CHARS).collect(),
        })
    }

    /// Evaluate a compiled template against `config`.
    pub fn render(&self, compiled: &CompiledTemplate, config: &Value) -> Result<String, RenderError> {
        match self.registry.render(&compiled.name, config) {
            Ok(html) => {
                if html.trim().is_empty() {
                    tracing::warn!(
                        target: "render",
                        config_keys = ?top_level_keys(config),
                        "Rendered HTML is empty"
                    );
                }
                Ok(html)
            }
            Err(e) => {
                let config_keys = top_level_keys(config);
                tracing::error!(
                    target: "render",
                    error = %e,
                    snippet = %compiled.snippet,
                    config_keys = ?config_keys,
                    "Template render failed"
                );
                Err(RenderError::Render {
                    message: e.to_string(),
                    snippet: compiled.snippet.clone(),
                    config_keys,
                })
            }
        }
    }

    /// Compile and render in one step.
    pub fn render_markup(&mut self, markup: &str, config: &Value) -> Result<String, RenderError> {
        let compiled = self.compile(markup)?;
        self.render(&compiled, config)
    }

    /// Render `archive` against `config` and resolve its asset references.
    pub fn preview(
        &mut self,
        archive: &TemplateArchive,
        config: &Value,
        mode: AssetMode,
    ) -> Result<Preview, RenderError> {
        let html = self.render_markup(&archive.template, config)?;
        let rewriter = AssetRewriter::for_preview(&archive.assets, mode)?;
        let preview = Preview {
            html: rewriter.rewrite(&html).into_owned(),
            css: rewriter.rewrite(&archive.styles).into_owned(),
        };
        tracing::debug!(
            target: "render",
            html_bytes = preview.html.len(),
            css_bytes = preview.css.len(),
            assets = archive.assets.len(),
            "Preview rendered"
        );
        Ok(preview)
    }
}

/// Render a preview with a fresh [`Renderer`].
pub fn render_preview(
    archive: &TemplateArchive,
    config: &Value,
    mode: AssetMode,
) -> Result<Preview, RenderError> {
    Renderer::new().preview(archive, config, mode)
}

// =============================================================================
// Asset references
// =============================================================================

/// Regex source matching any of `literals`, longest first.
pub fn literal_alternation<'a>(literals: impl IntoIterator<Item = &'a str>) -> String {
    let mut sorted: Vec<&str> = literals.into_iter().filter(|l| !l.is_empty()).collect();
    sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    sorted.dedup();
    sorted
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|")
}

/// Single-pass literal substitution of asset paths.
#[derive(Debug, Clone)]
pub struct AssetRewriter {
    pattern: Option<Regex>,
    replacements: HashMap<String, String>,
}

impl AssetRewriter {
    /// Rewriter replacing each key of `replacements` with its value.
    pub fn new(replacements: HashMap<String, String>) -> Result<Self, regex::Error> {
        let pattern = if replacements.is_empty() {
            None
        } else {
            Some(Regex::new(&literal_alternation(
                replacements.keys().map(String::as_str),
            ))?)
        };
        Ok(Self {
            pattern,
            replacements,
        })
    }

    /// Rewriter mapping every asset path to a blob handle or a data URI.
    pub fn for_preview(assets: &AssetCollection, mode: AssetMode) -> Result<Self, regex::Error> {
        let replacements = assets
            .iter()
            .map(|(path, bytes)| {
                let target = match mode {
                    AssetMode::Blob => crate::assets::blob_handle(bytes),
                    AssetMode::DataUri => data_uri(mime_for_path(path), bytes),
                };
                (path.to_string(), target)
            })
            .collect();
        Self::new(replacements)
    }

    pub fn rewrite<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.pattern {
            Some(pattern) => pattern.replace_all(text, |caps: &Captures| {
                self.replacements
                    .get(&caps[0])
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string())
            }),
            None => Cow::Borrowed(text),
        }
    }
}

/// Resolve asset references in `text` for preview.
pub fn resolve_asset_references(
    text: &str,
    assets: &AssetCollection,
    mode: AssetMode,
) -> Result<String, RenderError> {
    Ok(AssetRewriter::for_preview(assets, mode)?
        .rewrite(text)
        .into_owned())
}

// =============================================================================
// Preview document
// =============================================================================

/// Rendered page body and rewritten styles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preview {
    pub html: String,
    pub css: String,
}

impl Preview {
    /// Wrap the preview in a complete HTML document.
    pub fn document(&self, scripts: &str, lang: &str) -> String {
        html! {
            (DOCTYPE)
            html lang=(lang) {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    style { (PreEscaped(&self.css)) }
                }
                body {
                    (PreEscaped(&self.html))
                    @if !scripts.trim().is_empty() {
                        script { (PreEscaped(scripts)) }
                    }
                }
            }
        }
        .into_string()
    }
}
