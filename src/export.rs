//! Build/export pipeline: static site and draft save.
//!
//! ## Static site
//!
//! ```text
//! render(template, config) ──▶ html ─┐
//!                      styles ───────┼──▶ InlineExtractor ──▶ index.html, style.css
//!                                    │      (data URIs → files,
//! assets ──normalize──▶ placement ───┘       asset refs → export paths)
//!
//! zip: index.html, style.css, [script.js], assets/** (sorted)
//! ```
//!
//! The result is a finished site. It carries no manifest, schema or config
//! and cannot be reopened as a template.
//!
//! ## Draft
//!
//! The template exactly as loaded, plus `config.user.json` holding the edited
//! config and `.dlpt-metadata.json`. Reopening a draft gives back the same
//! template with the edits applied.
//!
//! ## Writing
//!
//! Both outputs are assembled fully in memory, written to a temporary file
//! next to the destination and renamed into place. A failed build never
//! leaves a truncated archive at the destination path.

use crate::archive::{BuildMetadata, TemplateArchive};
use crate::assets::{AssetCollection, normalize_asset_path};
use crate::codec::{Member, SCRIPTS_FILE, STYLES_FILE, TEMPLATE_FILE, draft_members, write_members};
use crate::config::ExportConfig;
use crate::inline::{InlineExtractor, SkippedAsset};
use crate::naming::{draft_output_path, site_output_path};
use crate::render::{RenderError, Renderer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Asset pattern error: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Assets {first} and {second} would both be exported as {path}")]
    AssetCollision {
        path: String,
        first: String,
        second: String,
    },
    #[error("No inline asset could be decoded ({0} skipped)")]
    InlineAssetsFailed(usize),
    #[error("Failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a static export produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub output_path: PathBuf,
    /// Archive assets copied into the site.
    pub assets: usize,
    /// Paths of files extracted from inline data URIs.
    pub extracted: Vec<String>,
    /// Inline payloads that matched an archive asset.
    pub reused: usize,
    pub skipped: Vec<SkippedAsset>,
}

/// A static site assembled in memory, ready to be written.
#[derive(Debug, Clone)]
pub struct StaticSite {
    pub members: Vec<Member>,
    pub assets: usize,
    pub extracted: Vec<String>,
    pub reused: usize,
    pub skipped: Vec<SkippedAsset>,
}

/// Export path of every archive asset.
///
/// Assets whose path normalizes to nothing are left out with a warning. Two
/// assets landing on the same export path is an error.
pub fn place_assets(assets: &AssetCollection) -> Result<BTreeMap<String, String>, BuildError> {
    let mut placement = BTreeMap::new();
    let mut owners: BTreeMap<String, String> = BTreeMap::new();
    for path in assets.paths() {
        let Some(dest) = normalize_asset_path(path) else {
            tracing::warn!(target: "export", asset = path, "Asset path is empty after normalization, skipping");
            continue;
        };
        if let Some(first) = owners.get(&dest) {
            return Err(BuildError::AssetCollision {
                path: dest,
                first: first.clone(),
                second: path.to_string(),
            });
        }
        owners.insert(dest.clone(), path.to_string());
        placement.insert(path.to_string(), dest);
    }
    Ok(placement)
}

/// Render `archive` with `config` and assemble the static site members.
pub fn stage_static_site(
    renderer: &mut Renderer,
    archive: &TemplateArchive,
    config: &Value,
    settings: &ExportConfig,
) -> Result<StaticSite, BuildError> {
    let html = renderer.render_markup(&archive.template, config)?;
    let placement = place_assets(&archive.assets)?;

    let mut extractor = InlineExtractor::new(&archive.assets, &placement, &settings.inline_prefix)?;
    let html = extractor.rewrite(&html);
    let css = extractor.rewrite(&archive.styles);
    let extraction = extractor.finish();
    if extraction.all_failed() {
        return Err(BuildError::InlineAssetsFailed(extraction.skipped.len()));
    }

    let mut files: BTreeMap<String, Vec<u8>> = placement
        .iter()
        .filter_map(|(from, to)| archive.assets.get(from).map(|b| (to.clone(), b.to_vec())))
        .collect();
    let extracted: Vec<String> = extraction.extracted.iter().map(|(p, _)| p.clone()).collect();
    files.extend(extraction.extracted);

    let mut members = vec![
        Member::new(TEMPLATE_FILE, html),
        Member::new(STYLES_FILE, css),
    ];
    if archive.has_scripts() {
        members.push(Member::new(SCRIPTS_FILE, archive.scripts.as_bytes()));
    }
    members.extend(files.into_iter().map(|(path, bytes)| Member::new(path, bytes)));

    Ok(StaticSite {
        members,
        assets: placement.len(),
        extracted,
        reused: extraction.reused,
        skipped: extraction.skipped,
    })
}

/// Render and write a static site to `dest` (`.zip` appended when missing).
pub fn build_static_site(
    archive: &TemplateArchive,
    config: &Value,
    dest: &Path,
    settings: &ExportConfig,
) -> Result<BuildReport, BuildError> {
    build_static_site_with(&mut Renderer::new(), archive, config, dest, settings)
}

/// [`build_static_site`] reusing an existing renderer.
pub fn build_static_site_with(
    renderer: &mut Renderer,
    archive: &TemplateArchive,
    config: &Value,
    dest: &Path,
    settings: &ExportConfig,
) -> Result<BuildReport, BuildError> {
    let output_path = site_output_path(dest);
    let result = stage_static_site(renderer, archive, config, settings).and_then(|site| {
        let bytes = write_members(&site.members, settings.compression)?;
        persist(&bytes, &output_path)?;
        Ok(site)
    });

    match result {
        Ok(site) => {
            tracing::info!(
                target: "export",
                path = %output_path.display(),
                assets = site.assets,
                extracted = site.extracted.len(),
                reused = site.reused,
                skipped = site.skipped.len(),
                "Static site built"
            );
            Ok(BuildReport {
                output_path,
                assets: site.assets,
                extracted: site.extracted,
                reused: site.reused,
                skipped: site.skipped,
            })
        }
        Err(e) => {
            tracing::error!(target: "export", path = %output_path.display(), error = %e, "Static build failed");
            Err(e)
        }
    }
}

/// Write a re-loadable draft of `archive` with `config` as its user config.
/// Returns the path written (`.dlpt` appended when needed).
pub fn save_draft(
    archive: &TemplateArchive,
    config: &Value,
    dest: &Path,
    settings: &ExportConfig,
) -> Result<PathBuf, BuildError> {
    let output_path = draft_output_path(dest);
    let metadata = BuildMetadata::draft(&archive.info());
    let result = draft_members(archive, config, &metadata)
        .map_err(BuildError::from)
        .and_then(|members| Ok(write_members(&members, settings.compression)?))
        .and_then(|bytes| persist(&bytes, &output_path));

    match result {
        Ok(()) => {
            tracing::info!(
                target: "export",
                path = %output_path.display(),
                template = %archive.info().id,
                "Draft saved"
            );
            Ok(output_path)
        }
        Err(e) => {
            tracing::error!(target: "export", path = %output_path.display(), error = %e, "Draft save failed");
            Err(e)
        }
    }
}

/// Write `bytes` to `dest` through a temporary file in the same directory.
fn persist(bytes: &[u8], dest: &Path) -> Result<(), BuildError> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| BuildError::Persist {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
