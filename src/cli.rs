//! CLI: schema files → (accessor sources | catalog view)
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::catalog::{Catalog, CatalogDescription, Classification};
use crate::config::GenOptions;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate typed row accessors for a family of ntuple formats
#[derive(Parser, Debug)]
#[command(name = "babygen", version)]
pub struct CommandLineInterface {
    /// log verbosity (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// parse the schema files and write the accessor sources
    Generate(GenerateOut),
    /// parse the schema files and print how each variable is classified
    Catalog(CatalogOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// JSON config file; flags given here override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// directory holding the schema files [default: txt/variables]
    #[arg(long)]
    schema_dir: Option<PathBuf>,

    /// format names, or quoted glob patterns, relative to the schema directory
    formats: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output directory [default: src/babies]
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// path the generated code uses to reach the runtime [default: babygen::runtime]
    #[arg(long)]
    runtime_path: Option<String>,

    /// implement variables with one type in every format in the base trait
    #[arg(long)]
    implement_common_in_base: bool,

    /// emit a single `babies.rs` with inline modules, for `include!`
    #[arg(long)]
    single_file: bool,
}

#[derive(clap::Parser, Debug)]
struct CatalogOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// print the description as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn options(&self) -> anyhow::Result<GenOptions> {
        let mut opts = GenOptions::load_or_default(self.config.as_deref())?;
        if let Some(dir) = &self.schema_dir {
            opts.schema_dir = dir.clone();
        }
        if !self.formats.is_empty() {
            opts.formats = self.formats.clone();
        }
        Ok(opts)
    }
}

fn load_catalog(opts: &GenOptions) -> anyhow::Result<Catalog> {
    if opts.formats.is_empty() {
        bail!("no schema formats given (pass them as arguments or under `formats` in the config)");
    }
    let paths = crate::schema::resolve_schema_files(&opts.schema_dir, &opts.formats)
        .context("failed to resolve schema files")?;
    crate::schema::parse_schema_files(&paths).context("failed to load schema files")
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                let mut opts = target.input_settings.options()?;
                if let Some(out) = &target.out {
                    opts.out_dir = out.clone();
                }
                if let Some(path) = &target.runtime_path {
                    opts.runtime_path = path.clone();
                }
                opts.implement_common_in_base |= target.implement_common_in_base;
                opts.single_file |= target.single_file;

                // 1) parse & classify
                let catalog = load_catalog(&opts)?;

                // 2) lower & emit; nothing is written unless this succeeds
                let files =
                    crate::generate_from_catalog(&catalog, &opts.policy(), opts.codegen_options())
                        .context("failed to generate accessors")?;

                // 3) write
                let written = crate::write_files(&files, &opts.out_dir).with_context(|| {
                    format!("failed to write artifacts to {}", opts.out_dir.display())
                })?;
                for path in written {
                    println!("{}", path.display());
                }
            }
            Command::Catalog(target) => {
                let opts = target.input_settings.options()?;
                let catalog = load_catalog(&opts)?;
                let description = catalog.describe(&opts.policy())?;

                let rendered = if target.json {
                    serde_json::to_string_pretty(&description)?
                } else {
                    if target.out.is_some() {
                        colored::control::set_override(false);
                    }
                    render_table(&description)
                };
                if let Some(out) = target.out.as_ref() {
                    if let Some(parent) = out.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(out, &rendered)
                        .with_context(|| format!("failed to write {}", out.display()))?;
                } else {
                    println!("{rendered}");
                }
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn render_table(description: &CatalogDescription) -> String {
    const CLASS_WIDTH: usize = 10;
    let name_width = description
        .variables
        .iter()
        .map(|v| v.name.len())
        .chain(std::iter::once("variable".len()))
        .max()
        .unwrap_or_default();
    let column_widths = description
        .formats
        .iter()
        .map(|format| {
            description
                .variables
                .iter()
                .filter_map(|v| v.types.get(&format.name).and_then(|t| t.as_deref()))
                .map(str::len)
                .chain(std::iter::once(format.name.len()))
                .max()
                .unwrap_or_default()
        })
        .collect::<Vec<_>>();

    let mut out = String::new();
    let mut header = format!("{:<name_width$}  {:<CLASS_WIDTH$}", "variable", "class");
    for (format, width) in description.formats.iter().zip(&column_widths) {
        let _ = write!(header, "  {:<width$}", format.name);
    }
    let _ = writeln!(out, "{}", header.trim_end().bold());

    for var in &description.variables {
        let class = format!("{:<CLASS_WIDTH$}", var.classification.to_string());
        let class = match var.classification {
            Classification::UniversalSingleType => class.green(),
            Classification::PartialSingleType => class.yellow(),
            Classification::MultipleTypes => class.red(),
        };
        let mut line = format!("{:<name_width$}  {class}", var.name);
        for (format, width) in description.formats.iter().zip(&column_widths) {
            match var.types.get(&format.name).and_then(|t| t.as_deref()) {
                Some(ty) => {
                    let _ = write!(line, "  {ty:<width$}");
                }
                None => {
                    let _ = write!(line, "  {}", format!("{:<width$}", "-").dimmed());
                }
            }
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}
