//! Language server client.
//!
//! The pipeline only depends on the [`LanguageServer`] trait: a handshake,
//! document outlines, and reference lookups. [`LspClient`] implements it
//! over JSON-RPC 2.0 on a child process's stdio.

pub mod client;
pub mod transport;
pub mod types;
pub mod uri;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use client::LspClient;
pub use types::{DocumentSymbol, Location, Position, Range, SymbolKind};

/// Failure of a single language server interaction.
#[derive(Debug, Clone, Error)]
pub enum LspError {
    /// The connection itself is broken. Every later request fails too.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server answered this request with an error object.
    #[error("server error {code}: {message}")]
    Response { code: i64, message: String },

    /// The server answered, but the result had an unexpected shape.
    #[error("unexpected result for {method}: {reason}")]
    Decode { method: String, reason: String },

    #[error("request cancelled")]
    Cancelled,
}

impl LspError {
    /// Errors that end the whole run rather than one query.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LspError::Transport(_) | LspError::Cancelled)
    }
}

/// The query contract the pipeline needs from a language server.
#[async_trait]
pub trait LanguageServer: Send + Sync {
    /// `initialize` request followed by the `initialized` notification.
    async fn initialize(
        &self,
        root: &Path,
        process_id: u32,
        cancel: &CancellationToken,
    ) -> Result<(), LspError>;

    /// Announce a document and its content.
    async fn did_open(&self, uri: &str, language_id: &str, text: &str) -> Result<(), LspError>;

    /// Hierarchical outline of one document.
    async fn document_symbols(
        &self,
        uri: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DocumentSymbol>, LspError>;

    /// Locations referencing the declaration at `position`.
    async fn references(
        &self,
        uri: &str,
        position: Position,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>, LspError>;

    /// `shutdown` request followed by `exit`.
    async fn shutdown(&self) -> Result<(), LspError>;
}
