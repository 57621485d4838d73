//! # archlens
//!
//! Architecture analysis backed by a language server.
//!
//! archlens loads a source folder, asks a language server for the symbols of
//! every file and for the references to every symbol, and turns the answers
//! into one annotated tree: folders contain files, files contain symbols,
//! symbols depend on each other.
//!
//! ## Key Features
//!
//! - **Language agnostic**: everything about code comes from the server
//! - **Cycle aware**: strongly connected components per scope
//! - **Deterministic**: stable sort, same input gives the same tree
//! - **Cancellable**: one token stops every in-flight request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use archlens::{AnalysisConfig, Project};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> archlens::Result<()> {
//! let mut config = AnalysisConfig::default();
//! config.project.root = "MyApp".into();
//!
//! let mut project = Project::new(config)?;
//! let tree = project.analyze(&CancellationToken::new()).await?;
//! for part in tree.root_view().parts() {
//!     println!("{} {:?}", part.name(), part.metrics().lines_of_code);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod cli;
pub mod config;
pub mod error;
pub mod lsp;
pub mod pipeline;
pub mod project;

// Re-exports for convenience
pub use error::{Error, Result};

pub use artifact::{
    Artifact, ArtifactId, ArtifactKind, ArtifactRef, ArtifactSnapshot, ArtifactTree, EdgeScope,
    Metrics,
};
pub use config::{AnalysisConfig, LspConfig, ProjectConfig};
pub use lsp::{LanguageServer, LspClient, LspError};
pub use pipeline::{run_analysis, LoadOptions, ScanStats};
pub use project::{AnalysisState, Project};
