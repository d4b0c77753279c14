//! PhotoDup - Duplicate photo scan supervisor.
//!
//! Headless entry point. It initializes:
//! - Logging infrastructure (file rotation + console output)
//! - Tokio async runtime (subprocess execution, stream readers)
//! - Configuration loading ([`ConfigManager`])
//! - The controller facade ([`ScanController`])
//!
//! then runs a minimal stdin-driven command loop standing in for the
//! external UI collaborator:
//!
//! ```text
//! scan <source> <output> [threshold]   start a scan
//! cancel                               request cancellation
//! quit                                 shut the worker down and exit
//! ```
//!
//! Session updates are printed to stdout as they arrive. The worker
//! process itself is spawned lazily on the first scan.

use anyhow::Result;
use photodup::session::{ScanOutcome, ScanUpdate};
use photodup::{APP_NAME, ConfigManager, ScanController, VERSION, WorkerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

fn main() -> Result<()> {
    let _guard = photodup::logging::setup_logging("logs", "photodup", false, false)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(4)
        .thread_name("photodup-runtime")
        .build()?;

    let config_manager = ConfigManager::new("PhotoDup Data")?;
    let user_config = config_manager.load_user_config()?;
    let worker_config = WorkerConfig::from_settings(&user_config.settings);
    let default_threshold = user_config.settings.default_threshold;

    tracing::info!(
        "Configuration loaded: worker={}, grace={:?}",
        worker_config.resolve_program(),
        worker_config.shutdown_grace
    );

    runtime.block_on(run_shell(worker_config, default_threshold))?;

    runtime.shutdown_timeout(Duration::from_secs(5));
    tracing::info!("Application shutdown complete");
    Ok(())
}

async fn run_shell(config: WorkerConfig, default_threshold: u32) -> Result<()> {
    let controller = Arc::new(ScanController::new(config));

    let mut updates = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => print_update(&update),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!("commands: scan <source> <output> [threshold] | cancel | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("scan") => {
                let (Some(source), Some(output)) = (parts.next(), parts.next()) else {
                    eprintln!("usage: scan <source> <output> [threshold]");
                    continue;
                };
                let threshold = parts
                    .next()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(default_threshold);
                if controller
                    .start_scan(source.into(), output.into(), threshold)
                    .await
                {
                    println!("scan accepted");
                } else {
                    println!("scan rejected (see log)");
                }
            }
            Some("cancel") => {
                if controller.cancel_scan().await {
                    println!("cancel requested");
                } else {
                    println!("nothing to cancel");
                }
            }
            Some("quit") => break,
            None => continue,
            Some(other) => eprintln!("unknown command: {other}"),
        }
    }

    controller.shutdown().await;
    Ok(())
}

fn print_update(update: &ScanUpdate) {
    match update {
        ScanUpdate::Started { request } => {
            println!("[scan] {} -> {}", request.source, request.output)
        }
        ScanUpdate::Status { message } => println!("[status] {message}"),
        ScanUpdate::Log { message } => println!("[log] {message}"),
        ScanUpdate::Progress { current, total } => {
            let progress = photodup::ScanProgress {
                current: *current,
                total: *total,
            };
            match progress.percent() {
                Some(fraction) => {
                    println!("[progress] {current}/{total} ({:.0}%)", fraction * 100.0)
                }
                None => println!("[progress] {current}/? (unknown)"),
            }
        }
        ScanUpdate::Warning { message } => eprintln!("[warning] {message}"),
        ScanUpdate::Finished { outcome } => match outcome {
            ScanOutcome::Completed { summary, errors } => {
                println!("[done] {summary} ({errors} errors)")
            }
            ScanOutcome::Cancelled => println!("[done] scan cancelled"),
            ScanOutcome::Failed { message } => println!("[failed] {message}"),
        },
    }
}
