//! Command handlers for the `policy` binary.

use std::io;
use std::path::Path;

use anyhow::{Result, bail};
use futures::StreamExt as _;
use policy_core::RagConfig;
use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use crate::cli::{Command, Variant};
use crate::server;
use crate::state::AppState;

/// Installs the global tracing subscriber, writing to stderr.
pub fn init_logging() {
    Registry::default()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "policy_context=info,policy_cli=info".into()),
        )
        .with(fmt::layer().with_writer(io::stderr).with_target(true))
        .init();
}

/// Runs `command` against `config`, writing user-facing output to `out`.
///
/// # Errors
/// Returns an error if the pipelines cannot be built or the command fails.
pub async fn run<W>(command: Command, config: &RagConfig, out: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let state = AppState::from_config(config)?;
    match command {
        Command::Serve { bind } => {
            let address = bind.unwrap_or_else(|| config.server.bind_address.clone());
            server::serve(state, &address).await
        }
        Command::Ingest { local, dir } => {
            let dir = dir.unwrap_or_else(|| state.documents_dir().to_path_buf());
            handle_ingest(&state, Variant::from_flag(local), &dir, out).await
        }
        Command::Ask {
            query,
            local,
            dry_run,
        } => handle_ask(&state, Variant::from_flag(local), &query, dry_run, out).await,
    }
}

/// Ingests `dir` and prints a one-line summary.
///
/// # Errors
/// Returns an error if the ingestion run fails.
pub async fn handle_ingest<W>(
    state: &AppState,
    variant: Variant,
    dir: &Path,
    out: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let pipelines = state.pipelines(variant);
    let report = pipelines.ingest(dir).await;
    for source in &report.skipped {
        out.write_all(format!("skipped {source}\n").as_bytes()).await?;
    }
    if !report.success {
        bail!(
            "ingestion failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }

    let summary = format!(
        "Ingested {} chunks from {} documents into {}\n",
        report.chunk_count,
        report.documents_ingested,
        pipelines.ingestion.collection()
    );
    out.write_all(summary.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

/// Answers `query`, streaming increments to `out` as they arrive.
///
/// With `dry_run` only the retrieved context is printed.
///
/// # Errors
/// Returns an error if retrieval fails or the answer stream ends with an error.
pub async fn handle_ask<W>(
    state: &AppState,
    variant: Variant,
    query: &str,
    dry_run: bool,
    out: &mut W,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    let retrieval = &state.pipelines(variant).retrieval;

    if dry_run {
        let chunks = retrieval.retrieve(query).await?;
        info!(chunks = chunks.len(), "Dry run, skipping generation");
        for chunk in &chunks {
            let line = format!(
                "[{:.4}] {} #{}: {}\n",
                chunk.distance,
                chunk.source,
                chunk.chunk_index,
                chunk.text.replace('\n', " ")
            );
            out.write_all(line.as_bytes()).await?;
        }
        out.flush().await?;
        return Ok(());
    }

    let mut stream = retrieval.answer(query).await?;
    while let Some(increment) = stream.next().await {
        out.write_all(increment?.as_bytes()).await?;
        out.flush().await?;
    }
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
