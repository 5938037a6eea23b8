//! Main entry point for the zipframe CLI application.
//!
//! Loads an archive from the local filesystem or an HTTP URL into an in-memory surface,
//! follows the requested navigations and prints the resulting document.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use zipframe::surface::{FetchRequest, NetworkClient};
use zipframe::{Cli, ExecutionContext, FrameConfig, LoadOutcome, MemorySurface, Session};

/// What `--json` prints.
#[derive(Serialize)]
struct Report {
    #[serde(flatten)]
    outcome: LoadOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<String>,
    base_path: String,
    files: usize,
    missing: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    navigation_errors: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    let mut config = match &cli.config {
        Some(path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            FrameConfig::from_json(&json)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => FrameConfig::default(),
    };
    if cli.raw {
        config.rewrite_documents = false;
    }

    let bytes = read_archive(&cli, &config).await?;

    let context = if cli.network {
        ExecutionContext::networked(&config.network)?
    } else {
        ExecutionContext::offline()
    };
    let surface = Arc::new(MemorySurface::new(context));
    let session = Session::with_config(surface.clone(), config);

    let loaded = session.try_load(bytes).await;
    let outcome = LoadOutcome::from(&loaded);

    let mut navigation_errors = Vec::new();
    if loaded.is_ok() {
        for target in &cli.navigate {
            if let Err(err) = session.navigate(target).await {
                warn!(target_path = %target, error = %err, "navigation failed");
                navigation_errors.push(format!("{target}: {err}"));
            }
        }
    }

    if cli.list {
        list_files(&session);
    }

    if cli.json {
        let report = Report {
            outcome: outcome.clone(),
            document: session.current_document(),
            base_path: session.base_path(),
            files: session.store().len(),
            missing: session
                .last_report()
                .map(|report| report.missing)
                .unwrap_or_default(),
            navigation_errors,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !cli.list {
        write_document(&cli, &surface.document()).await?;
    }

    // Releases every handle and restores the surface's primitives
    surface.unload();

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = format!("zipframe={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Read the whole archive, from disk or over HTTP.
async fn read_archive(cli: &Cli, config: &FrameConfig) -> Result<Vec<u8>> {
    if !cli.is_http_url() {
        return tokio::fs::read(&cli.archive)
            .await
            .with_context(|| format!("Failed to read {}", cli.archive));
    }

    let client = NetworkClient::new(&config.network)?;
    let response = client.execute(&FetchRequest::get(&cli.archive)).await?;
    if !response.ok() {
        anyhow::bail!(
            "Failed to download {}: {} {}",
            cli.archive,
            response.status,
            response.status_text
        );
    }
    Ok(response.body)
}

/// Print the archive's files with their content type and size.
fn list_files(session: &Session<MemorySurface>) {
    let store = session.store();
    let mut resources: Vec<_> = store.resources().collect();
    resources.sort_by(|a, b| a.path().cmp(b.path()));

    for resource in &resources {
        println!(
            "{:>10}  {:<28}  {}",
            resource.len(),
            resource.content_type(),
            resource.path()
        );
    }
    let total: usize = resources.iter().map(|resource| resource.len()).sum();
    println!("{:>10}  {:<28}  {} files", total, "", resources.len());
}

async fn write_document(cli: &Cli, document: &str) -> Result<()> {
    match &cli.output {
        Some(path) => tokio::fs::write(path, document)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout.write_all(document.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
            Ok(())
        }
    }
}
