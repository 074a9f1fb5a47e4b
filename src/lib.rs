//! # DLP Builder
//!
//! Opens packaged landing-page templates, lets the user edit the fields the
//! template exposes, previews the result and exports either a finished static
//! site or an editable draft.
//!
//! # Architecture: One Archive, Two Output Shapes
//!
//! A template is a ZIP (`.dlpt`, or `.zip` for older templates) holding
//! markup, styles, an optional script, a form schema, a default config and
//! binary assets. Everything flows from that one container:
//!
//! ```text
//! validate   archive  →  {valid, errors}        (structural pre-check, no parsing)
//! load       archive  →  TemplateArchive         (members classified by role)
//! edit       config   →  config'                 (replace-on-write patches)
//! render     archive + config → {html, css}      (handlebars, assets resolved)
//! build      archive + config → site.zip         (index.html, style.css, assets/**)
//! save       archive + config → draft.dlpt       (source + both configs + metadata)
//! ```
//!
//! A draft is itself a loadable template: loading it resumes from the saved
//! user config, and saving it again reproduces the same members.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`codec`] | ZIP member role table, archive load, draft member layout, ZIP writing |
//! | [`archive`] | In-memory template, manifest, draft build metadata |
//! | [`schema`] | Typed form schema: sections, fields, widget dispatch |
//! | [`validate`] | Extension and required-member check with accumulated issues |
//! | [`patch`] | Effective config resolution, path patches, array item operations |
//! | [`debounce`] | Latest-value-wins pending state with per-key quiet periods |
//! | [`assets`] | Asset collection, path normalization, MIME table, hashing, data URIs |
//! | [`render`] | Handlebars compile cache, custom helpers, asset reference rewriting |
//! | [`inline`] | Data-URI extraction with content-hash deduplication |
//! | [`export`] | Static site build and draft save, written atomically |
//! | [`naming`] | Output file names and extension handling |
//! | [`session`] | One open template: config, pending edits, last good preview |
//! | [`config`] | `dlp-builder.toml` settings over stock defaults |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Replace-On-Write Config
//!
//! The config is never mutated in place. Each patch returns a new value and
//! the session swaps an `Arc`, so anything holding the old config keeps a
//! consistent snapshot and change detection is pointer equality.
//!
//! ## Handlebars At Runtime, Maud For The Frame
//!
//! Template markup is authored outside this crate, so it is compiled at
//! runtime with `handlebars` and cached by content hash. The preview page
//! around it is ours and is generated with Maud, which auto-escapes the
//! parts we interpolate.
//!
//! ## Single-Pass Asset Rewriting
//!
//! Asset references are replaced with one regex built from every asset path,
//! longest first. A path that is a prefix of another (`a.png`,
//! `a.png.bak`) can never be half-replaced, and a replacement is never
//! scanned again.
//!
//! ## Atomic Output
//!
//! Builds and saves write to a temporary file next to the destination and
//! rename it into place. A failed build leaves no partial archive behind.

pub mod archive;
pub mod assets;
pub mod codec;
pub mod config;
pub mod debounce;
pub mod export;
pub mod inline;
pub mod logging;
pub mod naming;
pub mod output;
pub mod patch;
pub mod render;
pub mod schema;
pub mod session;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
