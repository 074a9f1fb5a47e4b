use clap::{Parser, Subcommand};
use dlp_builder::config::{self, BuilderConfig};
use dlp_builder::session::Session;
use dlp_builder::{codec, logging, output, patch, schema::TemplateSchema, validate};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "dlp-builder")]
#[command(about = "Edit, preview and export landing-page templates")]
#[command(long_about = "\
Edit, preview and export landing-page templates

A template is a ZIP archive (.dlpt, or .zip for older templates):

  template.dlpt
  ├── manifest.json          # id, name, version, author
  ├── schema.json            # form schema: sections and fields
  ├── config.default.json    # values shipped with the template
  ├── index.html             # Handlebars markup
  ├── style.css
  ├── script.js              # optional
  └── assets/                # images, fonts

Drafts saved with 'save' also carry config.user.json and .dlpt-metadata.json
and open again with the saved values.

Field values are set with --set KEY=VALUE. VALUE is parsed as JSON when it
parses, otherwise taken as a string:

  --set title=Spring Sale  --set overlayOpacity=40  --set 'links=[]'

Run 'dlp-builder gen-config' to generate a documented dlp-builder.toml.")]
#[command(version)]
struct Cli {
    /// Settings file [default: ./dlp-builder.toml when present]
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Field assignments applied before rendering.
#[derive(clap::Args, Clone)]
struct SetArgs {
    /// Set a field: KEY=VALUE (dotted keys reach nested values)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, Value)>,
}

/// Config edits for commands that write an archive.
#[derive(clap::Args, Clone)]
struct EditArgs {
    #[command(flatten)]
    sets: SetArgs,

    /// Start from this JSON config instead of the template's own
    #[arg(long, value_name = "JSON")]
    user_config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Check a template archive without loading it
    Validate { archive: PathBuf },
    /// Show manifest, form fields and assets
    Inspect { archive: PathBuf },
    /// Print the effective config
    Config { archive: PathBuf },
    /// Render the template to an HTML document
    Preview {
        archive: PathBuf,
        /// Write the document here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        sets: SetArgs,
    },
    /// Export a static site ZIP
    Build {
        archive: PathBuf,
        /// Site archive to write (.zip is appended)
        #[arg(long)]
        output: PathBuf,
        #[command(flatten)]
        edits: EditArgs,
    },
    /// Save an editable draft
    Save {
        archive: PathBuf,
        /// Draft to write [default: <id>_draft.dlpt next to the source]
        #[arg(long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        edits: EditArgs,
    },
    /// Print a stock dlp-builder.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let settings = load_settings(cli.settings.as_deref())?;
    let level = if cli.verbose {
        "debug"
    } else {
        settings.logging.level.as_str()
    };
    logging::init(level);

    match cli.command {
        Command::Validate { archive } => {
            let report = validate::validate_archive(&archive);
            output::print_validation(&archive, &report);
            if !report.is_valid() {
                return Err(format!("{} is not a valid template", archive.display()).into());
            }
        }
        Command::Inspect { archive } => {
            let template = codec::load_archive(&archive)?;
            let schema = TemplateSchema::from_value(&template.schema).ok();
            output::print_inspect(&template, schema.as_ref(), &settings.editor);
        }
        Command::Config { archive } => {
            let template = codec::load_archive(&archive)?;
            output::print_config(&patch::resolve(&template));
        }
        Command::Preview {
            archive,
            output: dest,
            sets,
        } => {
            let mut session = Session::open(&archive, settings)?;
            apply_sets(&mut session, &sets);
            session.refresh_preview()?;
            let document = session.preview_document().unwrap_or_default();
            match dest {
                Some(dest) => {
                    std::fs::write(&dest, &document)?;
                    output::print_preview_written(&dest, document.len());
                }
                None => println!("{}", document),
            }
        }
        Command::Build {
            archive,
            output: dest,
            edits,
        } => {
            let mut session = Session::open(&archive, settings)?;
            apply_edits(&mut session, &edits)?;
            let report = session.build(&dest)?;
            output::print_build_report(&report);
        }
        Command::Save {
            archive,
            output: dest,
            edits,
        } => {
            let mut session = Session::open(&archive, settings)?;
            apply_edits(&mut session, &edits)?;
            let dest = dest.unwrap_or_else(|| session.default_draft_path());
            let path = session.save(&dest)?;
            output::print_draft_saved(&path);
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Explicit `--settings` file, else `dlp-builder.toml` in the working
/// directory, else stock defaults.
fn load_settings(path: Option<&Path>) -> Result<BuilderConfig, config::ConfigError> {
    match path {
        Some(path) => config::load_config_file(path),
        None => config::load_config(Path::new(".")),
    }
}

fn apply_sets(session: &mut Session, sets: &SetArgs) {
    for (key, value) in &sets.set {
        session.set_field(key, value.clone());
    }
}

fn apply_edits(session: &mut Session, edits: &EditArgs) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &edits.user_config {
        let text = std::fs::read_to_string(path)?;
        let config: Value = serde_json::from_str(&text)?;
        session.replace_config(config);
    }
    apply_sets(session, &edits.sets);
    Ok(())
}

/// Parse `KEY=VALUE`; VALUE is JSON when it parses, otherwise a string.
fn parse_assignment(arg: &str) -> Result<(String, Value), String> {
    let (key, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{arg}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{arg}'"));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}
