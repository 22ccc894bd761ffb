use crate::display::{DisplayUpdater, LinkState};
use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

/// Reading the firmware emits when the probe is missing from the bus.
pub const SENSOR_DISCONNECTED_C: f64 = -127.0;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ReadingError {
    #[error("payload is not a number: {0:?}")]
    NotANumber(String),
    #[error("sensor reported disconnected")]
    SensorDisconnected,
}

pub fn parse_reading(payload: &str) -> Result<f64, ReadingError> {
    let trimmed = payload.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| ReadingError::NotANumber(trimmed.to_string()))?;
    if !value.is_finite() {
        return Err(ReadingError::NotANumber(trimmed.to_string()));
    }
    if value == SENSOR_DISCONNECTED_C {
        return Err(ReadingError::SensorDisconnected);
    }
    Ok(value)
}

/// Starts the receiver task. It ends when the device closes the socket;
/// there is no reconnect.
pub fn spawn_receiver(url: String, display: DisplayUpdater) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(err) = run(&url, &display).await {
            tracing::warn!("Telemetry connection to {url} failed: {err:?}");
        }
        display.set_link(LinkState::Closed);
        tracing::warn!("Telemetry connection closed; no further updates until restart");
    })
}

async fn run(url: &str, display: &DisplayUpdater) -> Result<()> {
    display.set_link(LinkState::Connecting);
    let (mut stream, _) = connect_async(url)
        .await
        .with_context(|| format!("Unable to connect to {url}"))?;
    display.set_link(LinkState::Open);
    tracing::info!("Receiving telemetry from {url}");

    while let Some(msg) = stream.next().await {
        match msg.context("Telemetry socket error")? {
            Message::Text(text) => handle_payload(&text, display),
            Message::Binary(bytes) => match std::str::from_utf8(&bytes) {
                Ok(text) => handle_payload(text, display),
                Err(_) => {
                    tracing::warn!("Dropping non-UTF-8 telemetry frame ({} bytes)", bytes.len())
                }
            },
            Message::Close(frame) => {
                tracing::debug!("Device sent close: {frame:?}");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

fn handle_payload(payload: &str, display: &DisplayUpdater) {
    match parse_reading(payload) {
        Ok(value) => {
            display.update(value);
        }
        Err(err) => tracing::warn!("Dropping telemetry payload: {err}"),
    }
}
