//! Analysis configuration.
//!
//! Loaded from a TOML file (usually `archlens.toml` in the project root) and
//! overridable from the command line. The project root is always an explicit
//! value; nothing about previously opened folders is remembered.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Top-level analysis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub lsp: LspConfig,
}

/// Which part of the file system gets analyzed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Root directory to scan (relative to the config file's directory).
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Accepted file extensions, with or without a leading dot.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Folder names that are never entered (exact, case-sensitive match).
    #[serde(default = "default_excluded_folders")]
    pub excluded_folders: Vec<String>,
    /// Honour `.gitignore` files while walking.
    #[serde(default)]
    pub respect_gitignore: bool,
    /// Skip dot-files and dot-folders.
    #[serde(default = "default_true")]
    pub skip_hidden: bool,
}

/// How to reach the language server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspConfig {
    /// Executable that speaks LSP over stdio.
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Language identifier sent with `textDocument/didOpen`.
    #[serde(default = "default_language_id")]
    pub language_id: String,
    /// Upper bound on in-flight requests during extraction and resolution.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Announce every file with `didOpen` before asking for its outline.
    #[serde(default = "default_true")]
    pub open_documents: bool,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extensions() -> Vec<String> {
    vec!["swift".to_string()]
}

fn default_excluded_folders() -> Vec<String> {
    vec![".build".to_string(), ".git".to_string()]
}

fn default_command() -> String {
    "sourcekit-lsp".to_string()
}

fn default_language_id() -> String {
    "swift".to_string()
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            extensions: default_extensions(),
            excluded_folders: default_excluded_folders(),
            respect_gitignore: false,
            skip_hidden: true,
        }
    }
}

impl Default for LspConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            language_id: default_language_id(),
            max_concurrent_requests: default_max_concurrent_requests(),
            open_documents: true,
        }
    }
}

impl AnalysisConfig {
    /// Load config from a TOML file.
    ///
    /// A relative `project.root` is resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;
        if config.project.root.is_relative() {
            let parent = path.parent().unwrap_or(Path::new("."));
            config.project.root = parent.join(&config.project.root);
        }
        config.validate()?;
        Ok(config)
    }

    /// Load config if the file exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.project.extensions.is_empty() {
            return Err(Error::Config("no file extensions configured".to_string()));
        }
        if self.lsp.command.trim().is_empty() {
            return Err(Error::Config("language server command is empty".to_string()));
        }
        if self.lsp.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Extensions without their leading dot.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.project
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .collect()
    }
}
