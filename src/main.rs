use std::env;

use anyhow::Context;
use bing_archiver::{
    background_task::start_sync_task,
    graceful_shutdown::shutdown_signal,
    settings::{AppConfig, LogFormat, RunFlags},
    telemetry::init_tracing,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            tracing::error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(config.log_format);
    tracing::info!("Loaded configuration: {:?}", config);

    let flags = RunFlags::from_args(env::args().skip(1));
    if !flags.unknown.is_empty() {
        tracing::warn!("Ignoring unknown arguments: {:?}", flags.unknown);
    }

    let state = AppState::new(&config).context("Failed to build application state")?;
    state
        .prepare(&config, flags.clean_db || config.purge_on_start)
        .await
        .context("Failed to prepare storage")?;

    tracing::info!(
        "🚀 Starting bing_archiver v{} (zone {}, every {}s)",
        env!("CARGO_PKG_VERSION"),
        config.zone,
        config.scan_interval_secs
    );

    if flags.once {
        let report = state
            .sync_handler
            .run_cycle()
            .await
            .context("Sync cycle failed")?;
        tracing::info!("Single cycle done: {:?}", report);
        return Ok(());
    }

    start_sync_task(&state.sync_handler, config.scan_interval(), shutdown_signal()).await;
    Ok(())
}
