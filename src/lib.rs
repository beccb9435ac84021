pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod notify;
pub mod remote;
pub mod services;
pub mod store;

use std::sync::Arc;

use anyhow::Context;

use config::DashboardConfig;
use notify::TracingNotifier;
use services::{BackgroundServices, Remotes};

/// Run the headless dashboard until Ctrl-C.
///
/// Everything runs on one cooperative thread: a current-thread tokio runtime.
pub fn run() -> anyhow::Result<()> {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!("PANIC in tariffguard: {info}");
        default_hook(info);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tariffguard=info,tariffguard_lib=info".into()),
        )
        .init();

    let config = DashboardConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        "Starting tariffguard against {} (poll every {}ms)",
        config.api_base,
        config.poll_interval.as_millis()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: DashboardConfig) -> anyhow::Result<()> {
    let remotes = Remotes::from_config(&config).context("failed to build API clients")?;
    let services =
        BackgroundServices::start(remotes, Arc::new(TracingNotifier), config.poll_interval).await;

    services::log_rule_table(&commands::rules::get_rules(&services.state));

    let mut ticker = tokio::time::interval(config.poll_interval);
    let mut offset = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                offset = services::log_new_packets(&services.state, offset);
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!("Failed to listen for Ctrl-C: {e}");
                }
                break;
            }
        }
    }

    tracing::info!("Shutting down");
    services.shutdown().await;
    Ok(())
}
