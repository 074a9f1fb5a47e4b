//! End-to-end tests through the public API: archives on disk in, archives
//! on disk out.

use dlp_builder::assets::data_uri;
use dlp_builder::codec::{self, LoadError, Role};
use dlp_builder::config::{AssetMode, BuilderConfig, ExportConfig};
use dlp_builder::export::{build_static_site, save_draft};
use dlp_builder::patch::{apply_patch, resolve};
use dlp_builder::render::render_preview;
use dlp_builder::session::Session;
use dlp_builder::validate::validate_archive;
use serde_json::{Value, json};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

// =========================================================================
// Fixtures
// =========================================================================

const LOGO: &[u8] = b"\x89PNG\r\n\x1a\nlogo-bytes";

fn write_zip(dir: &Path, name: &str, entries: &[(&str, Vec<u8>)]) -> PathBuf {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (entry, bytes) in entries {
        writer
            .start_file(*entry, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(bytes).unwrap();
    }
    let path = dir.join(name);
    std::fs::write(&path, writer.finish().unwrap().into_inner()).unwrap();
    path
}

fn json_bytes(value: Value) -> Vec<u8> {
    serde_json::to_vec_pretty(&value).unwrap()
}

fn template_entries(template: &str) -> Vec<(&'static str, Vec<u8>)> {
    vec![
        (
            "manifest.json",
            json_bytes(json!({
                "id": "spring-sale",
                "name": "Spring Sale",
                "version": "1.2.0",
                "author": {"name": "Circle", "url": "https://example.com"}
            })),
        ),
        (
            "schema.json",
            json_bytes(json!({
                "formSchema": {"sections": [{
                    "id": "basic",
                    "title": "Basic",
                    "fields": [
                        {"id": "title", "type": "text"},
                        {"id": "logo", "type": "image"},
                        {"id": "overlayOpacity", "type": "slider", "min": 0, "max": 100}
                    ]
                }]}
            })),
        ),
        ("config.default.json", json_bytes(json!({"title": "A", "logo": ""}))),
        ("index.html", template.as_bytes().to_vec()),
        ("style.css", b".hero { background: url(assets/logo.png); }".to_vec()),
        ("script.js", b"console.log('ready');".to_vec()),
        ("assets/logo.png", LOGO.to_vec()),
    ]
}

fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut entry = zip.by_index(i).unwrap();
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).unwrap();
            (entry.name().to_string(), bytes)
        })
        .collect()
}

fn entry_names(path: &Path) -> Vec<String> {
    let mut names: Vec<String> = read_entries(path).into_iter().map(|(n, _)| n).collect();
    names.sort();
    names
}

fn entry_text(path: &Path, name: &str) -> String {
    read_entries(path)
        .into_iter()
        .find(|(entry, _)| entry == name)
        .map(|(_, bytes)| String::from_utf8(bytes).unwrap())
        .unwrap_or_else(|| panic!("{name} not in {}", path.display()))
}

// =========================================================================
// Load, patch, render
// =========================================================================

#[test]
fn load_patch_render_scenario() {
    let tmp = TempDir::new().unwrap();
    let path = write_zip(tmp.path(), "t.dlpt", &template_entries("<h1>{{title}}</h1>"));

    assert!(validate_archive(&path).is_valid());
    let archive = codec::load_archive(&path).unwrap();
    assert!(archive.user_config.is_none());

    let config = resolve(&archive);
    assert_eq!(config["title"], "A");
    assert_eq!(resolve(&archive), config);

    let patched = apply_patch(&config, "title", json!("B"));
    assert_eq!(config["title"], "A");
    assert_eq!(patched["title"], "B");
    assert_eq!(patched["logo"], config["logo"]);

    let preview = render_preview(&archive, &patched, AssetMode::DataUri).unwrap();
    assert_eq!(preview.html, "<h1>B</h1>");
    assert!(preview.css.contains("url(data:image/png;base64,"));
}

#[test]
fn missing_members_are_named() {
    let tmp = TempDir::new().unwrap();
    let path = write_zip(
        tmp.path(),
        "partial.zip",
        &[
            ("index.html", b"<p></p>".to_vec()),
            ("style.css", Vec::new()),
        ],
    );

    match codec::load_archive(&path) {
        Err(LoadError::MissingMembers(roles)) => {
            assert_eq!(roles, vec![Role::Manifest, Role::Schema, Role::DefaultConfig]);
        }
        other => panic!("expected MissingMembers, got {other:?}"),
    }

    let report = validate_archive(&path);
    assert!(!report.is_valid());
    let messages = report.messages().join("\n");
    assert!(messages.contains("manifest.json"));
    assert!(messages.contains("schema.json"));
    assert!(messages.contains("config.default.json"));
}

#[test]
fn wrong_extension_fails_validation() {
    let tmp = TempDir::new().unwrap();
    let path = write_zip(tmp.path(), "t.tar", &template_entries("<p></p>"));
    let report = validate_archive(&path);
    assert!(!report.is_valid());
    assert!(report.messages()[0].contains(".dlpt"));
}

// =========================================================================
// Static export
// =========================================================================

#[test]
fn static_export_dedups_inline_asset() {
    let tmp = TempDir::new().unwrap();
    let path = write_zip(
        tmp.path(),
        "t.dlpt",
        &template_entries("<img src=\"{{logo}}\"><h1>{{title}}</h1>"),
    );
    let archive = codec::load_archive(&path).unwrap();
    let config = apply_patch(&resolve(&archive), "logo", json!(data_uri("image/png", LOGO)));

    let report = build_static_site(
        &archive,
        &config,
        &tmp.path().join("site"),
        &ExportConfig::default(),
    )
    .unwrap();

    assert_eq!(report.output_path, tmp.path().join("site.zip"));
    assert!(report.extracted.is_empty());
    assert_eq!(report.reused, 1);
    assert_eq!(
        entry_names(&report.output_path),
        vec!["assets/logo.png", "index.html", "script.js", "style.css"]
    );
    assert_eq!(
        entry_text(&report.output_path, "index.html"),
        "<img src=\"assets/logo.png\"><h1>A</h1>"
    );
}

#[test]
fn static_export_extracts_new_inline_asset() {
    let tmp = TempDir::new().unwrap();
    let path = write_zip(tmp.path(), "t.dlpt", &template_entries("<img src=\"{{{logo}}}\">"));
    let archive = codec::load_archive(&path).unwrap();
    let config = apply_patch(
        &resolve(&archive),
        "logo",
        json!(data_uri("image/jpeg", b"a different picture")),
    );

    let report = build_static_site(
        &archive,
        &config,
        &tmp.path().join("site.zip"),
        &ExportConfig::default(),
    )
    .unwrap();

    assert_eq!(report.extracted, vec!["assets/inline-image-1.jpg"]);
    let names = entry_names(&report.output_path);
    assert!(names.contains(&"assets/inline-image-1.jpg".to_string()));
    assert!(!names.iter().any(|n| n.ends_with(".json")));
}

// =========================================================================
// Draft save
// =========================================================================

#[test]
fn draft_round_trip_preserves_template() {
    let tmp = TempDir::new().unwrap();
    let path = write_zip(tmp.path(), "t.dlpt", &template_entries("<h1>{{title}}</h1>"));
    let original = codec::load_archive(&path).unwrap();
    let config = apply_patch(&resolve(&original), "title", json!("Saved"));

    let saved = save_draft(
        &original,
        &config,
        &tmp.path().join("draft"),
        &ExportConfig::default(),
    )
    .unwrap();
    assert_eq!(saved, tmp.path().join("draft.dlpt"));

    let names = entry_names(&saved);
    assert!(names.contains(&".dlpt-metadata.json".to_string()));
    assert!(names.contains(&"config.user.json".to_string()));

    let reloaded = codec::load_archive(&saved).unwrap();
    assert_eq!(reloaded.manifest, original.manifest);
    assert_eq!(reloaded.schema, original.schema);
    assert_eq!(reloaded.default_config, original.default_config);
    assert_eq!(reloaded.template, original.template);
    assert_eq!(reloaded.styles, original.styles);
    assert_eq!(reloaded.scripts, original.scripts);
    assert_eq!(reloaded.assets, original.assets);
    assert_eq!(reloaded.user_config, Some(config.clone()));
    assert!(reloaded.is_draft());
    assert_eq!(resolve(&reloaded), config);
}

// =========================================================================
// Session
// =========================================================================

#[test]
fn session_edits_flow_into_build_and_save() {
    let tmp = TempDir::new().unwrap();
    let path = write_zip(
        tmp.path(),
        "t.dlpt",
        &template_entries("<h1 style=\"opacity:{{overlayOpacity}}\">{{title}}</h1>"),
    );
    let mut session = Session::open(&path, BuilderConfig::default()).unwrap();
    let now = std::time::Instant::now();

    session.edit_field("title", json!("Live"), now);
    session.edit_field("overlayOpacity", json!(30), now);
    assert!(session.has_pending_edits());

    let report = session.build(&tmp.path().join("out")).unwrap();
    assert!(!session.has_pending_edits());
    assert_eq!(
        entry_text(&report.output_path, "index.html"),
        "<h1 style=\"opacity:30\">Live</h1>"
    );

    let draft = session.save(&session.default_draft_path()).unwrap();
    assert_eq!(draft, tmp.path().join("spring-sale_draft.dlpt"));
    let reopened = Session::open(&draft, BuilderConfig::default()).unwrap();
    assert_eq!(reopened.config()["overlayOpacity"], 30);
    assert_eq!(reopened.config()["title"], "Live");
}
