//! archlens CLI - dependency structure of a source tree.
//!
//! Usage:
//!   archlens analyze                       # Analyze the current directory
//!   archlens analyze --root MyApp --json   # JSON snapshot of the sorted tree
//!   archlens analyze --server clangd --ext c --ext h
//!   archlens scan                          # Count what would be analyzed
//!
//! Logs go to stderr; set RUST_LOG to change the level (default: info).

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use archlens::cli::{render_tree, resolve_config, Cli, Commands};
use archlens::pipeline::{load, LoadOptions};
use archlens::{ArtifactSnapshot, Project, ScanStats};

#[tokio::main]
async fn main() {
    // stdout carries the tree, diagnostics go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = resolve_config(cli.root.as_deref(), cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Scan { filter } => {
            filter.apply(&mut config);
            let folder = load(LoadOptions::from_config(&config)).await?;
            println!("{}", ScanStats::of(&folder));
        }

        Commands::Analyze {
            server,
            server_args,
            filter,
            json,
            depth,
        } => {
            filter.apply(&mut config);
            if let Some(command) = server {
                config.lsp.command = command;
            }
            if !server_args.is_empty() {
                config.lsp.args = server_args;
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, cancelling analysis");
                    on_interrupt.cancel();
                }
            });

            let mut project = Project::new(config)?;
            let tree = project.analyze(&cancel).await?;

            if json {
                let snapshot = ArtifactSnapshot::capture(tree.root_view(), depth);
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                print!("{}", render_tree(&tree, depth));
            }

            let stats = tree.stats();
            info!(
                folders = stats.folders,
                files = stats.files,
                symbols = stats.symbols,
                scope_edges = stats.scope_edges,
                external_edges = stats.external_edges,
                "analysis complete"
            );
        }
    }

    Ok(())
}
