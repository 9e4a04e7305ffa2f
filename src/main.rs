//! release-relay - Release Notes Webhook Relay
//!
//! Subscribes to the release update channel and posts every release notes
//! diff to the configured chat webhooks.

use anyhow::Result;
use clap::Parser;
use release_relay::{
    app::App, cli::Cli, config::Config, internal_metrics::logging_recorder::LoggingRecorder,
    task_manager::TaskManager,
};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Logs a startup failure and terminates the process.
fn exit_with_error(message: impl std::fmt::Display) -> ! {
    init_tracing("info");
    error!("{}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.env_file {
        Some(path) => {
            if let Err(e) = dotenvy::from_path(path) {
                exit_with_error(format_args!("Failed to load env file {}: {}", path.display(), e));
            }
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load_from_cli(cli)
        .unwrap_or_else(|err| exit_with_error(format_args!("Failed to load configuration: {}", err)));

    init_tracing(&config.core.log_level);

    let endpoints = config.endpoints_from_env();
    if let Err(err) = config.validate(&endpoints) {
        exit_with_error(err);
    }

    info!("release-relay starting up...");
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.core.log_level);
    info!("Channel: {}", config.transport.channel);
    info!("Webhooks: {}", endpoints.len());
    match config.request_timeout() {
        Some(timeout) => info!("Request Timeout: {}s", timeout.as_secs()),
        None => info!("Request Timeout: None"),
    }
    info!("Log Metrics: {}", config.metrics.log_metrics);
    info!("-------------------------------------------------------");

    let task_manager = TaskManager::new();

    if config.metrics.log_metrics {
        let (recorder, handle) = LoggingRecorder::new(
            Duration::from_secs(config.metrics.log_interval_seconds.max(1)),
            task_manager.shutdown_rx(),
        );
        match metrics::set_global_recorder(recorder) {
            Ok(()) => task_manager.spawn("MetricsLogger", async move {
                let _ = handle.await;
            }),
            Err(e) => {
                warn!("Failed to install logging recorder: {}", e);
                handle.abort();
            }
        }
    }

    let app = match App::builder(config, endpoints)
        .task_manager(task_manager.clone())
        .build()
        .await
    {
        Ok(app) => app,
        Err(e) => exit_with_error(format_args!("{:#}", e)),
    };

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received. Shutting down gracefully...");
                task_manager.signal_shutdown();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    app.run().await?;

    info!("All tasks shut down. Exiting.");
    Ok(())
}
