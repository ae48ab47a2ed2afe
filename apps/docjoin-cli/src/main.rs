//! docjoin command-line interface
//!
//! Merges PDFs and slide decks from disk, extracts page ranges, and runs
//! JSON commands against the core pipeline.

mod config;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use docjoin_core::classify::{PDF_MEDIA_TYPE, PPTX_MEDIA_TYPE, PPT_MEDIA_TYPE};
use docjoin_core::{
    classify, parse_index_ordering, run_command, AssemblyRequest, CanvasPolicy, DocumentKind,
    InputDocument, JoinCommand, PageDocument, SlideDeck,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "docjoin")]
#[command(version, about = "Merge PDFs and slide decks, extract page ranges")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge documents into <stem>.pdf and/or <stem>.pptx
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Processing order as file names, comma separated
        #[arg(long, value_delimiter = ',', conflicts_with = "order_indices")]
        order: Option<Vec<String>>,

        /// Processing order as 1-based positions of FILES, e.g. 2,1,3
        #[arg(long)]
        order_indices: Option<String>,

        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        #[arg(long)]
        output_stem: Option<String>,

        /// Fail on the first document that cannot be used
        #[arg(long)]
        strict: bool,

        /// Scale slides from decks with a different canvas size
        #[arg(long)]
        scale_canvas: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract pages from a PDF, in the order given
    Extract {
        file: PathBuf,

        /// Page range such as "3,1-2"
        #[arg(long)]
        pages: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show how documents are classified and how many pages or slides they have
    Inspect {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Run a JSON command file and print the result
    Exec { command: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Merge {
            files,
            order,
            order_indices,
            out_dir,
            output_stem,
            strict,
            scale_canvas,
            json,
        } => {
            if strict {
                config.best_effort = false;
            }
            if scale_canvas {
                config.canvas_policy = CanvasPolicy::Scale;
            }
            if output_stem.is_some() {
                config.output_stem = output_stem;
            }

            let inputs = files
                .iter()
                .map(|path| read_input(path))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let ordering = match order_indices {
                Some(text) => {
                    let names: Vec<&str> = inputs.iter().map(InputDocument::name).collect();
                    Some(parse_index_ordering(&text, &names)?)
                }
                None => order,
            };

            let report = config
                .assembler()
                .assemble(&AssemblyRequest { inputs, ordering })?;

            for failure in &report.failures {
                tracing::warn!(name = %failure.name, kind = ?failure.kind, "{}", failure.message);
            }
            for warning in &report.warnings {
                tracing::warn!("{}", warning);
            }

            fs::create_dir_all(&out_dir)
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            for artifact in report.artifacts() {
                let path = out_dir.join(&artifact.file_name);
                fs::write(&path, &artifact.bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !json {
                    println!("{} ({} units)", path.display(), artifact.units);
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            if report.artifacts().next().is_none() {
                bail!("no document could be merged");
            }
        }
        Commands::Extract {
            file,
            pages,
            output,
        } => {
            let input = read_input(&file)?;
            let artifact = config.assembler().extract(&input, &pages)?;
            let path = output.unwrap_or_else(|| PathBuf::from(&artifact.file_name));
            fs::write(&path, &artifact.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} ({} pages)", path.display(), artifact.units);
        }
        Commands::Inspect { files } => {
            for path in &files {
                let input = read_input(path)?;
                println!("{}", describe(&input));
            }
        }
        Commands::Exec { command } => {
            let json = fs::read_to_string(&command)
                .with_context(|| format!("Failed to read {}", command.display()))?;
            let result = run_command(&config.assembler(), JoinCommand::from_json(&json)?);
            println!("{}", result.to_json()?);
            if !result.success {
                bail!(result.error.unwrap_or_else(|| "command failed".to_string()));
            }
        }
    }

    Ok(())
}

/// Declared media type for a file on disk, from its extension.
fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => PDF_MEDIA_TYPE,
        "pptx" => PPTX_MEDIA_TYPE,
        "ppt" => PPT_MEDIA_TYPE,
        _ => "application/octet-stream",
    }
}

fn read_input(path: &Path) -> anyhow::Result<InputDocument> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file: {}", path.display()))?;
    Ok(InputDocument::new(name, media_type_for(path), bytes))
}

fn describe(input: &InputDocument) -> String {
    let kind = classify(input.name(), input.media_type());
    let detail = match kind {
        DocumentKind::Pdf => match PageDocument::parse(input.name(), input.bytes()) {
            Ok(doc) => format!("{} pages", doc.page_count()),
            Err(e) => format!("unreadable: {}", e),
        },
        DocumentKind::SlideDeck => match SlideDeck::parse(input.name(), input.bytes()) {
            Ok(deck) => {
                let canvas = deck.canvas();
                format!(
                    "{} slides, canvas {}x{}",
                    deck.slide_count(),
                    canvas.width,
                    canvas.height
                )
            }
            Err(e) => format!("unreadable: {}", e),
        },
        DocumentKind::LegacySlideDeck => "needs conversion".to_string(),
        DocumentKind::Unknown => "not supported".to_string(),
    };
    format!("{}\t{:?}\t{}", input.name(), kind, detail)
}
