//! Runs one upload and reports its events on the terminal.

use anyhow::anyhow;
use chunkup_uploader::{UploadConfig, UploadEvent, Uploader};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub async fn run(config: UploadConfig) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        file = %config.file.display(),
        endpoint = %config.endpoint,
        "starting upload"
    );

    let mut uploader = Uploader::new(config)?;
    let mut events = uploader
        .take_events()
        .ok_or_else(|| anyhow!("event stream already taken"))?;

    let cancel = uploader.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling upload");
            cancel.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let line = describe(&event);
            match event {
                UploadEvent::Progress { .. } | UploadEvent::Finished => println!("{line}"),
                UploadEvent::Retry { .. } | UploadEvent::Failed { .. } => eprintln!("{line}"),
            }
        }
    });

    let result = uploader.run().await;
    // Dropping the uploader closes the event channel so the printer drains and exits.
    drop(uploader);
    join_printer(printer).await;

    let summary = result?;
    info!(
        file_id = %summary.file_id,
        chunks = summary.total_chunks,
        bytes = summary.bytes_sent,
        retries = summary.retries,
        "upload complete"
    );
    Ok(())
}

/// Waits for the event printer. Returns `false` if it panicked or was aborted.
async fn join_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "event printer did not finish cleanly");
            false
        }
    }
}

fn describe(event: &UploadEvent) -> String {
    match event {
        UploadEvent::Progress { percent } => format!("progress: {percent}%"),
        UploadEvent::Retry { message, .. } => format!("retry: {message}"),
        UploadEvent::Finished => "upload finished".to_string(),
        UploadEvent::Failed { error } => format!("upload failed: {error}"),
    }
}
