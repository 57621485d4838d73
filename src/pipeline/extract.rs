//! Symbol extractor: one `documentSymbol` request per file.
//!
//! Files are queried with bounded concurrency, but results are applied in
//! file order so the symbol tree is the same on every run.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::artifact::{ArtifactId, ArtifactKind, ArtifactTree};
use crate::error::{Error, Result};
use crate::lsp::{DocumentSymbol, LanguageServer, LspError};

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub language_id: String,
    pub max_concurrent_requests: usize,
    /// Send `didOpen` with the file text before asking for its outline.
    pub open_documents: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            language_id: "swift".to_string(),
            max_concurrent_requests: 8,
            open_documents: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files: usize,
    pub symbols: usize,
    /// Files whose outline request the server rejected.
    pub failed_files: usize,
}

struct FileJob {
    file: ArtifactId,
    uri: String,
    text: Option<String>,
}

/// Add the symbol hierarchy of every file to `tree`.
///
/// A file the server cannot outline is logged and left without symbols.
/// A broken connection or cancellation ends the phase with an error.
pub async fn extract_symbols(
    tree: &mut ArtifactTree,
    server: &dyn LanguageServer,
    options: &ExtractOptions,
    cancel: &CancellationToken,
) -> Result<ExtractReport> {
    let jobs: Vec<FileJob> = tree
        .files()
        .into_iter()
        .filter_map(|file| {
            let artifact = tree.get(file);
            match &artifact.kind {
                ArtifactKind::File { uri, .. } => Some(FileJob {
                    file,
                    uri: uri.clone(),
                    text: options
                        .open_documents
                        .then(|| artifact.code.clone().unwrap_or_default()),
                }),
                _ => None,
            }
        })
        .collect();

    let mut report = ExtractReport {
        files: jobs.len(),
        ..ExtractReport::default()
    };
    let language_id = options.language_id.as_str();
    let mut outlines = stream::iter(jobs)
        .map(|job| async move {
            let outcome = outline(server, &job, language_id, cancel).await;
            (job, outcome)
        })
        .buffered(options.max_concurrent_requests.max(1));

    while let Some((job, outcome)) = outlines.next().await {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        match outcome {
            Ok(symbols) => {
                for symbol in &symbols {
                    tree.add_symbol(job.file, job.file, symbol);
                    report.symbols += count_symbols(symbol);
                }
                debug!(uri = %job.uri, symbols = symbols.len(), "outlined file");
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                report.failed_files += 1;
                warn!(uri = %job.uri, error = %e, "could not retrieve symbols, skipping file");
            }
        }
    }

    Ok(report)
}

async fn outline(
    server: &dyn LanguageServer,
    job: &FileJob,
    language_id: &str,
    cancel: &CancellationToken,
) -> std::result::Result<Vec<DocumentSymbol>, LspError> {
    if cancel.is_cancelled() {
        return Err(LspError::Cancelled);
    }
    if let Some(text) = &job.text {
        server.did_open(&job.uri, language_id, text).await?;
    }
    server.document_symbols(&job.uri, cancel).await
}

fn count_symbols(symbol: &DocumentSymbol) -> usize {
    1 + symbol
        .children
        .iter()
        .flatten()
        .map(count_symbols)
        .sum::<usize>()
}
