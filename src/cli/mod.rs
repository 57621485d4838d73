//! CLI module for archlens.
//!
//! Commands:
//! - analyze: full pipeline, prints the sorted tree (text or JSON)
//! - scan: loader only, prints what would be analyzed

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::artifact::{ArtifactRef, ArtifactTree};
use crate::config::AnalysisConfig;
use crate::error::Result;

/// Config file looked up in the project root when `--config` is not given.
pub const CONFIG_FILE_NAME: &str = "archlens.toml";

#[derive(Parser)]
#[command(name = "archlens")]
#[command(about = "Dependency structure of a source tree, as seen by its language server")]
pub struct Cli {
    /// Project root directory (default: from config, else current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Config file (default: <root>/archlens.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze the project and print the sorted artifact tree
    Analyze {
        /// Language server executable
        #[arg(long)]
        server: Option<String>,

        /// Argument passed to the language server (repeatable)
        #[arg(long = "server-arg")]
        server_args: Vec<String>,

        #[command(flatten)]
        filter: FileFilter,

        /// Print a JSON snapshot instead of text
        #[arg(long)]
        json: bool,

        /// Only print this many levels below the root
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Count the folders, files and lines that would be analyzed
    Scan {
        #[command(flatten)]
        filter: FileFilter,
    },
}

/// File selection flags shared by all commands.
#[derive(clap::Args, Debug, Default)]
pub struct FileFilter {
    /// Accepted file extension (repeatable)
    #[arg(long = "ext")]
    pub extensions: Vec<String>,

    /// Folder name to skip (repeatable)
    #[arg(long)]
    pub exclude: Vec<String>,
}

impl FileFilter {
    pub fn apply(&self, config: &mut AnalysisConfig) {
        if !self.extensions.is_empty() {
            config.project.extensions = self.extensions.clone();
        }
        config
            .project
            .excluded_folders
            .extend(self.exclude.iter().cloned());
    }
}

/// Build the effective config from an optional file and an optional root.
///
/// An explicit `--config` must exist. Without it, `<root>/archlens.toml` is
/// used when present. An explicit `--root` always wins over the file.
pub fn resolve_config(root: Option<&Path>, config: Option<&Path>) -> Result<AnalysisConfig> {
    let mut resolved = match (config, root) {
        (Some(path), _) => AnalysisConfig::load(path)?,
        (None, Some(root)) => AnalysisConfig::load_or_default(&root.join(CONFIG_FILE_NAME))?,
        (None, None) => AnalysisConfig::load_or_default(Path::new(CONFIG_FILE_NAME))?,
    };
    if let Some(root) = root {
        resolved.project.root = root.to_path_buf();
    }
    Ok(resolved)
}

// ─── Text Output ────────────────────────────────────────────────

/// Indented tree, one artifact per line, with its metrics.
pub fn render_tree(tree: &ArtifactTree, depth: Option<usize>) -> String {
    let mut out = String::new();
    render_artifact(&mut out, tree.root_view(), 0, depth);
    out
}

fn render_artifact(out: &mut String, artifact: ArtifactRef<'_>, level: usize, depth: Option<usize>) {
    let _ = writeln!(
        out,
        "{}{} [{}]{}",
        "  ".repeat(level),
        artifact.name(),
        artifact.kind().name(),
        metrics_summary(artifact)
    );
    if depth.is_some_and(|max| level >= max) {
        return;
    }
    for part in artifact.parts() {
        render_artifact(out, part, level + 1, depth);
    }
}

fn metrics_summary(artifact: ArtifactRef<'_>) -> String {
    let m = artifact.metrics();
    let mut summary = String::new();
    if let Some(loc) = m.lines_of_code {
        let _ = write!(summary, " loc={}", loc);
    }
    if let Some(component) = m.component_number {
        let _ = write!(summary, " component={}", component);
    }
    if let Some(incoming) = m.incoming_dependencies_in_scope {
        if incoming > 0 {
            let _ = write!(summary, " incoming={}", incoming);
        }
    }
    if let Some(diff) = m.dependency_difference_scope.filter(|d| *d != 0) {
        let _ = write!(summary, " scope_diff={:+}", diff);
    }
    if let Some(diff) = m.dependency_difference_external.filter(|d| *d != 0) {
        let _ = write!(summary, " external_diff={:+}", diff);
    }
    if let Some(cycles) = m.lines_of_code_of_parts_in_cycles.filter(|c| *c > 0) {
        let _ = write!(summary, " in_cycles={}", cycles);
    }
    summary
}
