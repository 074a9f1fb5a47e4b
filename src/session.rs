//! One open template and everything the editor needs around it.
//!
//! A [`Session`] replaces window-global state: the loaded archive, the
//! current config, pending debounced edits, the renderer cache and the last
//! good preview all live here and are passed around explicitly.
//!
//! ## Config ownership
//!
//! The config is held as `Arc<Value>` and never mutated in place. Every
//! commit builds a new value with [`crate::patch`] and swaps the `Arc`, so
//! observers detect change with `Arc::ptr_eq`.
//!
//! ## Edit flow
//!
//! ```text
//! edit_field ──Immediate──▶ commit ─────────────┐
//!      │                                        ├──▶ request_render (coalesced)
//!      └──Debounced──▶ overlay ──quiet──▶ commit┘
//! ```
//!
//! Previews render the committed config with the overlay applied, so the
//! page follows a slider while it is still being dragged. Builds and saves
//! flush the overlay first; a pending edit is never lost.

use crate::archive::TemplateArchive;
use crate::codec::{LoadError, load_archive};
use crate::config::BuilderConfig;
use crate::debounce::Debouncer;
use crate::export::{BuildError, BuildReport, build_static_site_with, save_draft};
use crate::naming::default_draft_name;
use crate::patch::{self, PatchError};
use crate::render::{Preview, RenderError, Renderer};
use crate::schema::{EditMode, TemplateSchema};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

const RENDER_KEY: &str = "preview";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Build(#[from] BuildError),
}

pub struct Session {
    archive: TemplateArchive,
    schema: Option<TemplateSchema>,
    config: Arc<Value>,
    settings: BuilderConfig,
    edits: Debouncer<Value>,
    renders: Debouncer<()>,
    renderer: Renderer,
    preview: Option<Preview>,
}

impl Session {
    /// Load a template from disk and start editing it.
    pub fn open(path: &Path, settings: BuilderConfig) -> Result<Self, SessionError> {
        let archive = load_archive(path)?;
        Ok(Self::from_archive(archive, settings))
    }

    pub fn from_archive(archive: TemplateArchive, settings: BuilderConfig) -> Self {
        let schema = match TemplateSchema::from_value(&archive.schema) {
            Ok(schema) => Some(schema),
            Err(e) => {
                tracing::warn!(
                    target: "session",
                    template = %archive.info().id,
                    error = %e,
                    "Form schema not understood, editing without widgets"
                );
                None
            }
        };
        let config = Arc::new(patch::resolve(&archive));
        tracing::info!(
            target: "session",
            template = %archive.info().id,
            draft = archive.is_draft(),
            "Session opened"
        );
        Self {
            archive,
            schema,
            config,
            settings,
            edits: Debouncer::new(),
            renders: Debouncer::new(),
            renderer: Renderer::new(),
            preview: None,
        }
    }

    pub fn archive(&self) -> &TemplateArchive {
        &self.archive
    }

    pub fn schema(&self) -> Option<&TemplateSchema> {
        self.schema.as_ref()
    }

    pub fn settings(&self) -> &BuilderConfig {
        &self.settings
    }

    /// The committed config. Pending edits are not included.
    pub fn config(&self) -> &Arc<Value> {
        &self.config
    }

    /// The committed config with pending edits applied.
    pub fn live_config(&self) -> Value {
        self.edits
            .iter()
            .fold((*self.config).clone(), |view, (path, value)| {
                patch::apply_patch(&view, path, value.clone())
            })
    }

    /// Current value of a field: the pending edit if any, else the committed one.
    pub fn field_value(&self, path: &str) -> Option<Value> {
        self.edits
            .peek(path)
            .cloned()
            .or_else(|| patch::value_at(&self.config, path).cloned())
    }

    pub fn has_pending_edits(&self) -> bool {
        !self.edits.is_empty()
    }

    // =========================================================================
    // Editing
    // =========================================================================

    fn commit(&mut self, config: Value) {
        self.config = Arc::new(config);
    }

    /// Apply a value immediately, discarding any pending edit of the same path.
    pub fn set_field(&mut self, path: &str, value: Value) {
        self.edits.cancel(path);
        let next = patch::apply_patch(&self.config, path, value);
        self.commit(next);
        tracing::debug!(target: "session", field = path, "Field committed");
    }

    /// Replace the whole config, dropping pending edits.
    pub fn replace_config(&mut self, config: Value) {
        self.edits.take_all();
        self.commit(config);
        tracing::debug!(target: "session", "Config replaced");
    }

    /// Route an edit through the field's widget: immediate fields commit at
    /// once, sliders and colors wait in the overlay. Returns the mode used.
    pub fn edit_field(&mut self, path: &str, value: Value, now: Instant) -> EditMode {
        let mode = self.edit_mode(path);
        match mode {
            EditMode::Immediate => self.set_field(path, value),
            EditMode::Debounced(delay) => self.edits.push(path, value, now, delay),
        }
        self.request_render(now);
        mode
    }

    /// Edit mode of the schema field owning `path` (its first segment).
    /// Paths the schema does not describe edit immediately.
    pub fn edit_mode(&self, path: &str) -> EditMode {
        let id = path.split('.').next().unwrap_or(path);
        self.schema
            .as_ref()
            .and_then(|schema| schema.field(id))
            .map(|field| field.widget().edit_mode(&self.settings.editor))
            .unwrap_or(EditMode::Immediate)
    }

    /// Commit pending edits whose quiet period has passed. Returns how many.
    pub fn flush_due(&mut self, now: Instant) -> usize {
        let due = self.edits.take_due(now);
        self.commit_pending(due)
    }

    /// Commit every pending edit now.
    pub fn flush_all(&mut self) -> usize {
        let all = self.edits.take_all();
        self.commit_pending(all)
    }

    fn commit_pending(&mut self, entries: Vec<(String, Value)>) -> usize {
        if entries.is_empty() {
            return 0;
        }
        let count = entries.len();
        let mut next = (*self.config).clone();
        for (path, value) in entries {
            next = patch::apply_patch(&next, &path, value);
        }
        self.commit(next);
        tracing::debug!(target: "session", count, "Pending edits committed");
        count
    }

    /// Append a new entry (from the field's `itemTemplate`) to an array field.
    pub fn append_item(&mut self, path: &str) -> Result<(), SessionError> {
        self.flush_all();
        let item = self
            .schema
            .as_ref()
            .and_then(|schema| schema.field(path))
            .map(|field| field.new_item())
            .unwrap_or_else(|| Value::Object(Default::default()));
        let next = patch::append_item(&self.config, path, item)?;
        self.commit(next);
        Ok(())
    }

    pub fn remove_item(&mut self, path: &str, index: usize) -> Result<(), SessionError> {
        self.flush_all();
        let next = patch::remove_item(&self.config, path, index)?;
        self.commit(next);
        Ok(())
    }

    pub fn update_item(
        &mut self,
        path: &str,
        index: usize,
        key: &str,
        value: Value,
    ) -> Result<(), SessionError> {
        self.flush_all();
        let next = patch::update_item(&self.config, path, index, key, value)?;
        self.commit(next);
        Ok(())
    }

    // =========================================================================
    // Preview
    // =========================================================================

    /// Ask for a re-render; requests inside the debounce window coalesce.
    pub fn request_render(&mut self, now: Instant) {
        let delay = self.settings.preview.render_debounce();
        self.renders.push(RENDER_KEY, (), now, delay);
    }

    pub fn render_pending(&self) -> bool {
        !self.renders.is_empty()
    }

    /// Commit due edits, then re-render if a render request is due.
    /// Returns `None` when nothing was due.
    pub fn render_if_due(&mut self, now: Instant) -> Option<Result<&Preview, RenderError>> {
        self.flush_due(now);
        if self.renders.take_due(now).is_empty() {
            return None;
        }
        Some(self.refresh_preview())
    }

    /// Render the live config now. On failure the last good preview is kept.
    pub fn refresh_preview(&mut self) -> Result<&Preview, RenderError> {
        let config = self.live_config();
        match self
            .renderer
            .preview(&self.archive, &config, self.settings.preview.asset_mode)
        {
            Ok(preview) => Ok(&*self.preview.insert(preview)),
            Err(e) => {
                tracing::warn!(
                    target: "session",
                    error = %e,
                    has_previous = self.preview.is_some(),
                    "Preview failed, keeping last good preview"
                );
                Err(e)
            }
        }
    }

    /// Last successfully rendered preview.
    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// Bytes behind a blob handle from a blob-mode preview, for a host that
    /// serves the preview's assets.
    pub fn resolve_blob(&self, handle: &str) -> Option<&[u8]> {
        let handles = self.archive.assets.blob_handles();
        handles
            .get(handle)
            .and_then(|path| self.archive.assets.get(path))
    }

    /// Last good preview as a full HTML document.
    pub fn preview_document(&self) -> Option<String> {
        self.preview
            .as_ref()
            .map(|p| p.document(&self.archive.scripts, &self.settings.preview.lang))
    }

    // =========================================================================
    // Output
    // =========================================================================

    /// Export the static site. Pending edits are committed first.
    pub fn build(&mut self, dest: &Path) -> Result<BuildReport, SessionError> {
        self.flush_all();
        let report = build_static_site_with(
            &mut self.renderer,
            &self.archive,
            &self.config,
            dest,
            &self.settings.export,
        )?;
        Ok(report)
    }

    /// Save a draft. Pending edits are committed first, and the saved config
    /// becomes the archive's user config.
    pub fn save(&mut self, dest: &Path) -> Result<PathBuf, SessionError> {
        self.flush_all();
        let path = save_draft(&self.archive, &self.config, dest, &self.settings.export)?;
        self.archive.replace_user_config((*self.config).clone());
        Ok(path)
    }

    /// Where a draft goes by default: next to the opened file, named after
    /// the template id.
    pub fn default_draft_path(&self) -> PathBuf {
        let name = default_draft_name(&self.archive.info().id);
        match self.archive.file_path.as_deref().and_then(Path::parent) {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }
}
