//! Archive codec: ZIP container ⇄ [`TemplateArchive`].
//!
//! ## Member roles
//!
//! Every non-directory entry is classified by its *base name* (the last path
//! segment, so a template zipped inside a top-level folder still loads):
//!
//! | Base name | Role | Required |
//! |-----------|------|----------|
//! | `manifest.json`, `template.json` | manifest | yes |
//! | `schema.json`, `config.schema.json` | schema | yes |
//! | `config.default.json` | default config | yes |
//! | `config.user.json` | user config | no |
//! | `.dlpt-metadata.json` | draft metadata | no |
//! | `index.html`, `template.html` | markup | yes |
//! | `style.css` | styles | yes |
//! | `script.js` | scripts | no |
//!
//! Anything else becomes an asset keyed by its full archive path, except
//! `*.md` files and dotfiles.
//!
//! When two aliases of the same role are present, the first alias in the
//! table wins no matter where it sits in the archive (`manifest.json` over
//! `template.json`). Two entries with the *same* alias (e.g. in different
//! folders) resolve to the first one in archive order.
//!
//! ## Output shapes
//!
//! - **Draft** ([`draft_members`]): everything needed to reload the template
//!   plus `config.user.json` and `.dlpt-metadata.json`.
//! - **Static site**: built by [`crate::export`], written through
//!   [`write_members`]. Carries no manifest, schema or config.

use crate::archive::{BuildMetadata, TemplateArchive};
use crate::assets::AssetCollection;
use crate::config::Compression;
use serde_json::Value;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SCHEMA_FILE: &str = "schema.json";
pub const DEFAULT_CONFIG_FILE: &str = "config.default.json";
pub const USER_CONFIG_FILE: &str = "config.user.json";
pub const METADATA_FILE: &str = ".dlpt-metadata.json";
pub const TEMPLATE_FILE: &str = "index.html";
pub const STYLES_FILE: &str = "style.css";
pub const SCRIPTS_FILE: &str = "script.js";

const MAX_PREALLOC: u64 = 1 << 20;

/// Semantic role of an archive member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Manifest,
    Schema,
    DefaultConfig,
    UserConfig,
    Metadata,
    Template,
    Styles,
    Scripts,
}

impl Role {
    /// Members a template cannot load without.
    pub const REQUIRED: [Role; 5] = [
        Role::Manifest,
        Role::Schema,
        Role::DefaultConfig,
        Role::Template,
        Role::Styles,
    ];

    /// Accepted base names, highest precedence first.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Role::Manifest => &[MANIFEST_FILE, "template.json"],
            Role::Schema => &[SCHEMA_FILE, "config.schema.json"],
            Role::DefaultConfig => &[DEFAULT_CONFIG_FILE],
            Role::UserConfig => &[USER_CONFIG_FILE],
            Role::Metadata => &[METADATA_FILE],
            Role::Template => &[TEMPLATE_FILE, "template.html"],
            Role::Styles => &[STYLES_FILE],
            Role::Scripts => &[SCRIPTS_FILE],
        }
    }

    /// Role and alias precedence (0 = preferred) for a base name.
    pub fn classify(base_name: &str) -> Option<(Role, usize)> {
        const ALL: [Role; 8] = [
            Role::Manifest,
            Role::Schema,
            Role::DefaultConfig,
            Role::UserConfig,
            Role::Metadata,
            Role::Template,
            Role::Styles,
            Role::Scripts,
        ];
        ALL.iter().find_map(|role| {
            role.aliases()
                .iter()
                .position(|alias| *alias == base_name)
                .map(|rank| (*role, rank))
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.aliases().join(" or "))
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Invalid JSON in {member}: {source}")]
    Json {
        member: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} is not valid UTF-8 text")]
    NotText(String),
    #[error("Missing required members: {}", join_roles(.0))]
    MissingMembers(Vec<Role>),
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Last path segment of an archive entry name.
pub fn base_name(entry_name: &str) -> &str {
    entry_name.rsplit(&['/', '\\'][..]).next().unwrap_or(entry_name)
}

/// Whether an unclassified entry should be kept as an asset.
fn is_asset_entry(entry_name: &str) -> bool {
    let base = base_name(entry_name);
    !base.is_empty() && !base.starts_with('.') && !entry_name.ends_with(".md")
}

/// Raw bytes of a classified member plus where it came from.
struct Slot {
    rank: usize,
    name: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct Slots {
    filled: Vec<(Role, Slot)>,
}

impl Slots {
    fn offer(&mut self, role: Role, rank: usize, name: &str, bytes: Vec<u8>) {
        match self.filled.iter_mut().find(|(r, _)| *r == role) {
            Some((_, existing)) if rank < existing.rank => {
                tracing::debug!(
                    target: "archive",
                    preferred = name,
                    replaced = %existing.name,
                    "Preferring higher-precedence alias"
                );
                *existing = Slot {
                    rank,
                    name: name.to_string(),
                    bytes,
                };
            }
            Some((_, existing)) => {
                tracing::warn!(
                    target: "archive",
                    ignored = name,
                    kept = %existing.name,
                    "Duplicate {} member ignored",
                    role
                );
            }
            None => self.filled.push((
                role,
                Slot {
                    rank,
                    name: name.to_string(),
                    bytes,
                },
            )),
        }
    }

    fn take(&mut self, role: Role) -> Option<Slot> {
        let idx = self.filled.iter().position(|(r, _)| *r == role)?;
        Some(self.filled.swap_remove(idx).1)
    }
}

/// Load a template archive from a file on disk.
pub fn load_archive(path: &Path) -> Result<TemplateArchive, LoadError> {
    let bytes = std::fs::read(path)?;
    let mut archive = load(&bytes).inspect_err(|e| {
        tracing::warn!(target: "archive", path = %path.display(), error = %e, "Failed to load template");
    })?;
    archive.file_path = Some(path.to_path_buf());
    let info = archive.info();
    tracing::info!(
        target: "archive",
        path = %path.display(),
        id = %info.id,
        version = %info.version,
        assets = archive.assets.len(),
        "Template loaded"
    );
    Ok(archive)
}

/// Parse archive bytes into a [`TemplateArchive`].
pub fn load(bytes: &[u8]) -> Result<TemplateArchive, LoadError> {
    let mut zip = ZipArchive::new(Cursor::new(bytes))?;
    let mut slots = Slots::default();
    let mut assets = AssetCollection::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().replace('\\', "/");
        // Declared sizes are untrusted; cap the preallocation.
        let mut content = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
        entry.read_to_end(&mut content)?;

        match Role::classify(base_name(&name)) {
            Some((role, rank)) => slots.offer(role, rank, &name, content),
            None if is_asset_entry(&name) => {
                assets.insert(name, content);
            }
            None => tracing::debug!(target: "archive", entry = %name, "Skipping entry"),
        }
    }

    let missing: Vec<Role> = Role::REQUIRED
        .into_iter()
        .filter(|role| !slots.filled.iter().any(|(r, _)| r == role))
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::MissingMembers(missing));
    }

    let manifest = parse_json(required(&mut slots, Role::Manifest)?)?;
    let schema = parse_json(required(&mut slots, Role::Schema)?)?;
    let default_config = parse_json(required(&mut slots, Role::DefaultConfig)?)?;
    let template = parse_text(required(&mut slots, Role::Template)?)?;
    let styles = parse_text(required(&mut slots, Role::Styles)?)?;
    let scripts = slots
        .take(Role::Scripts)
        .map(parse_text)
        .transpose()?
        .unwrap_or_default();
    let user_config = slots.take(Role::UserConfig).map(parse_json).transpose()?;
    let metadata = slots.take(Role::Metadata).map(parse_json).transpose()?;

    Ok(TemplateArchive {
        file_path: None,
        manifest,
        schema,
        default_config,
        user_config,
        template,
        styles,
        scripts,
        assets,
        metadata,
    })
}

fn required(slots: &mut Slots, role: Role) -> Result<Slot, LoadError> {
    slots
        .take(role)
        .ok_or_else(|| LoadError::MissingMembers(vec![role]))
}

fn parse_json(slot: Slot) -> Result<Value, LoadError> {
    let bytes = strip_bom(&slot.bytes);
    serde_json::from_slice(bytes).map_err(|source| LoadError::Json {
        member: slot.name,
        source,
    })
}

fn parse_text(slot: Slot) -> Result<String, LoadError> {
    match String::from_utf8(slot.bytes) {
        Ok(text) => Ok(text),
        Err(_) => Err(LoadError::NotText(slot.name)),
    }
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

// =============================================================================
// Writing
// =============================================================================

/// One file to be written into an output archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl Member {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }

    fn json(path: &str, value: &impl serde::Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self::new(path, serde_json::to_string_pretty(value)?))
    }
}

/// Members of a draft save: the template as loaded plus the edited config.
pub fn draft_members(
    archive: &TemplateArchive,
    user_config: &Value,
    metadata: &BuildMetadata,
) -> Result<Vec<Member>, serde_json::Error> {
    let mut members = vec![
        Member::json(MANIFEST_FILE, &archive.manifest)?,
        Member::json(SCHEMA_FILE, &archive.schema)?,
        Member::json(DEFAULT_CONFIG_FILE, &archive.default_config)?,
        Member::new(TEMPLATE_FILE, archive.template.as_bytes()),
        Member::new(STYLES_FILE, archive.styles.as_bytes()),
    ];
    if !archive.scripts.is_empty() {
        members.push(Member::new(SCRIPTS_FILE, archive.scripts.as_bytes()));
    }
    members.push(Member::json(USER_CONFIG_FILE, user_config)?);
    members.push(Member::json(METADATA_FILE, metadata)?);
    members.extend(
        archive
            .assets
            .iter()
            .map(|(path, bytes)| Member::new(path, bytes)),
    );
    Ok(members)
}

/// Serialize members into ZIP bytes, in the order given.
pub fn write_members(
    members: &[Member],
    compression: Compression,
) -> Result<Vec<u8>, zip::result::ZipError> {
    let method = match compression {
        Compression::Deflated => CompressionMethod::Deflated,
        Compression::Stored => CompressionMethod::Stored,
    };
    let options = SimpleFileOptions::default().compression_method(method);

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for member in members {
        writer.start_file(member.path.as_str(), options)?;
        writer.write_all(&member.bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}
