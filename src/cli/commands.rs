//! CLI command definitions using clap.

use clap::{Args, Parser, Subcommand};
use eyre::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// Refinr - iteratively refine text toward a goal
#[derive(Parser, Debug)]
#[command(name = "refinr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print stage progress as the run advances
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refine an artifact toward a goal
    Run(RunArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// What the refined artifact should achieve
    #[arg(short, long)]
    pub goal: String,

    /// Artifact text to refine
    #[arg(short, long, conflicts_with = "artifact_file", required_unless_present = "artifact_file")]
    pub artifact: Option<String>,

    /// Read the artifact from a file
    #[arg(short = 'f', long)]
    pub artifact_file: Option<PathBuf>,

    /// Iteration budget; overrides refine.max_iterations
    #[arg(short, long)]
    pub max_iterations: Option<u32>,

    /// Print the final state as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// The artifact text, from the flag or the file
    pub fn artifact_text(&self) -> Result<String> {
        match (&self.artifact, &self.artifact_file) {
            (Some(text), _) => Ok(text.clone()),
            (None, Some(path)) => fs::read_to_string(path)
                .context(format!("Failed to read artifact from {}", path.display())),
            (None, None) => eyre::bail!("either --artifact or --artifact-file is required"),
        }
    }
}
