//! TOML configuration for the CLI
//!
//! ```toml
//! best_effort = true
//! canvas_policy = "scale"
//! output_stem = "handout"
//!
//! [legacy_converter]
//! program = "soffice"
//! args = ["--headless", "--convert-to", "pptx", "--outdir", "{outdir}", "{input}"]
//! output_extension = "pptx"
//! timeout_secs = 60
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use docjoin_core::{Assembler, AssemblyOptions, CanvasPolicy, CommandConverter, CommandSpec};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Skip failing documents instead of failing the run (default: true)
    #[serde(default = "default_best_effort")]
    pub best_effort: bool,
    #[serde(default)]
    pub canvas_policy: CanvasPolicy,
    /// Where staging areas are created (default: the OS temp dir)
    #[serde(default)]
    pub staging_root: Option<PathBuf>,
    #[serde(default)]
    pub output_stem: Option<String>,
    /// Converts `.ppt` decks before merging
    #[serde(default)]
    pub legacy_converter: Option<CommandSpec>,
    /// Renders decks to PDF so they join the merged PDF too
    #[serde(default)]
    pub deck_pdf_export: Option<CommandSpec>,
}

fn default_best_effort() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            best_effort: default_best_effort(),
            canvas_policy: CanvasPolicy::default(),
            staging_root: None,
            output_stem: None,
            legacy_converter: None,
            deck_pdf_export: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// `path` if given, else the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn assembly_options(&self) -> AssemblyOptions {
        let defaults = AssemblyOptions::default();
        AssemblyOptions {
            best_effort: self.best_effort,
            canvas_policy: self.canvas_policy,
            staging_root: self.staging_root.clone().unwrap_or(defaults.staging_root),
            output_stem: self.output_stem.clone().unwrap_or(defaults.output_stem),
        }
    }

    pub fn assembler(&self) -> Assembler {
        let mut assembler = Assembler::new(self.assembly_options());
        if let Some(spec) = &self.legacy_converter {
            assembler =
                assembler.with_legacy_converter(Box::new(CommandConverter::new(spec.clone())));
        }
        if let Some(spec) = &self.deck_pdf_export {
            assembler =
                assembler.with_deck_exporter(Box::new(CommandConverter::new(spec.clone())));
        }
        assembler
    }
}
