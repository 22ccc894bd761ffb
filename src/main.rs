mod config;
mod display;
mod series;
mod service_mode;
mod telemetry;
#[cfg(test)]
mod testing;
mod ui;
mod web;

use crate::config::AppConfig;
use crate::display::DisplayUpdater;
use crate::service_mode::ServiceModeClient;
use crate::web::AppState;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = Arc::new(AppConfig::from_env());

    tracing::info!(
        "Starting thermoscope on {} (device: {})",
        config.http_bind,
        config.device_host
    );

    let display = DisplayUpdater::new();
    let receiver = telemetry::spawn_receiver(config.telemetry_url(), display.clone());

    let state = AppState {
        config: config.clone(),
        display: display.clone(),
        service_mode: ServiceModeClient::new(config.device_base_url()),
    };

    web::serve(state).await?;

    receiver.abort();
    if let Some(path) = &config.series_csv_path {
        if let Err(err) = write_csv(path, &display).await {
            tracing::warn!("Unable to export series: {err:?}");
        }
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}

async fn write_csv(path: &Path, display: &DisplayUpdater) -> Result<()> {
    tokio::fs::write(path, display.export_csv())
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Series exported to {}", path.display());
    Ok(())
}
