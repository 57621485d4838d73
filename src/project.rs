//! One analyzable project and the state of its latest analysis.

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::artifact::ArtifactTree;
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::lsp::{LanguageServer, LspClient};
use crate::pipeline::run_analysis;

/// Where the latest analysis stands.
#[derive(Debug, Clone)]
pub enum AnalysisState {
    Stopped,
    Running,
    Succeeded(Arc<ArtifactTree>),
    Failed(String),
}

impl PartialEq for AnalysisState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Stopped, Self::Stopped) | (Self::Running, Self::Running) => true,
            (Self::Succeeded(a), Self::Succeeded(b)) => Arc::ptr_eq(a, b),
            (Self::Failed(a), Self::Failed(b)) => a == b,
            _ => false,
        }
    }
}

impl AnalysisState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// A project folder plus the analysis runs made on it.
///
/// Runs take `&mut self`, so at most one is in flight. Observers follow
/// state changes through [`Project::subscribe`].
pub struct Project {
    config: AnalysisConfig,
    state: watch::Sender<AnalysisState>,
    last_tree: Option<Arc<ArtifactTree>>,
}

impl Project {
    /// Fails with [`Error::Input`] if the project folder does not exist.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let root = &config.project.root;
        if !root.is_dir() {
            return Err(Error::Input(format!(
                "project folder does not exist: {}",
                root.display()
            )));
        }
        let (state, _) = watch::channel(AnalysisState::Stopped);
        Ok(Self {
            config,
            state,
            last_tree: None,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn state(&self) -> AnalysisState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AnalysisState> {
        self.state.subscribe()
    }

    /// Tree of the most recent successful run; survives later failures.
    pub fn last_tree(&self) -> Option<Arc<ArtifactTree>> {
        self.last_tree.clone()
    }

    /// Start the configured language server, analyze, and shut it down.
    pub async fn analyze(&mut self, cancel: &CancellationToken) -> Result<Arc<ArtifactTree>> {
        let client = match LspClient::spawn(&self.config.lsp, &self.config.project.root) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                let err = Error::from(e);
                self.state.send_replace(AnalysisState::Failed(err.to_string()));
                return Err(err);
            }
        };

        let result = self.analyze_with(client.clone(), cancel).await;
        if let Err(e) = client.shutdown().await {
            debug!(error = %e, "language server did not shut down cleanly");
        }
        result
    }

    /// Analyze using an already running server.
    pub async fn analyze_with(
        &mut self,
        server: Arc<dyn LanguageServer>,
        cancel: &CancellationToken,
    ) -> Result<Arc<ArtifactTree>> {
        info!(root = %self.config.project.root.display(), "analysis started");
        self.state.send_replace(AnalysisState::Running);

        match run_analysis(&self.config, server, cancel).await {
            Ok(tree) => {
                let tree = Arc::new(tree);
                self.last_tree = Some(Arc::clone(&tree));
                self.state
                    .send_replace(AnalysisState::Succeeded(Arc::clone(&tree)));
                Ok(tree)
            }
            Err(Error::Cancelled) => {
                info!("analysis cancelled");
                self.state.send_replace(AnalysisState::Stopped);
                Err(Error::Cancelled)
            }
            Err(e) => {
                error!(error = %e, "analysis failed");
                self.state.send_replace(AnalysisState::Failed(e.to_string()));
                Err(e)
            }
        }
    }
}
