use std::path::PathBuf;
use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;
use ferry::utils::format_bytes;
use ferry::{logging, Config, SelectedFile, UploadEvent, UploadOutcome, UploadSlot};

/// Upload a file the way the editor's image node does
#[derive(Parser, Debug)]
#[command(name = "ferry", version)]
struct Cli {
    /// TOML config; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Files to submit as one selection (only the first is uploaded)
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .await
            .with_context(|| format!("Can't load {}", path.display()))?,
        None => Config::default(),
    };

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let file = SelectedFile::from_path(path)
            .await
            .with_context(|| format!("Can't read {}", path.display()))?;
        info!(file = %file.name, size = %format_bytes(file.size), mime = %file.mime, "selected");
        files.push(file);
    }

    let transport = config.transport.build()?;
    let handle = UploadSlot::new(transport, config.slot.clone());
    let slot = handle.slot.clone();

    let mut events = slot.subscribe_events();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(UploadEvent::Progress { progress, .. }) => eprintln!("{:>3}%", progress),
                // 失败和拒绝由 main 的返回值报告
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let pending = slot.start(files).await?;
    info!(upload_id = %pending.upload_id, "uploading");

    let outcome = tokio::select! {
        outcome = pending.outcome() => outcome,
        _ = tokio::signal::ctrl_c() => {
            slot.cancel().await?;
            UploadOutcome::Cancelled
        }
    };

    drop(slot);
    handle.shutdown().await?;
    let _ = printer.await;

    match outcome {
        UploadOutcome::Completed(content) => {
            println!("{}", serde_json::to_string_pretty(&content)?);
            Ok(())
        }
        UploadOutcome::Failed(err) => Err(err.into()),
        UploadOutcome::Cancelled => {
            eprintln!("cancelled");
            Ok(())
        }
    }
}
