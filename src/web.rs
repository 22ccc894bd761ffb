use crate::config::AppConfig;
use crate::display::{ChartFrame, DisplayUpdater};
use crate::service_mode::{CallOutcome, PanelVisibility, ServiceModeClient};
use crate::ui;
use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket};
use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::header,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub display: DisplayUpdater,
    pub service_mode: ServiceModeClient,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/telemetry", get(telemetry))
        .route("/api/series.csv", get(series_csv))
        .route("/api/service-mode", get(service_mode))
        .route("/api/service-mode/activate", post(activate_service_mode))
        .route("/ws/telemetry", get(ws_telemetry))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr: SocketAddr = state
        .config
        .http_bind
        .parse()
        .with_context(|| format!("Invalid HTTP_BIND {}", state.config.http_bind))?;
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Unable to bind {addr}"))?;
    tracing::info!("UI listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(graceful_shutdown())
        .await?;

    Ok(())
}

async fn graceful_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutting down http server");
}

async fn index(State(state): State<AppState>) -> impl IntoResponse {
    let query = state.service_mode.query_service_mode().await;
    let panel = PanelVisibility::from_query(&query);
    Html(ui::render_html(
        &state.config.device_host,
        &state.display.snapshot(),
        panel,
    ))
}

async fn telemetry(State(state): State<AppState>) -> Json<ChartFrame> {
    Json(state.display.snapshot())
}

async fn series_csv(State(state): State<AppState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"temperature.csv\"",
            ),
        ],
        state.display.export_csv(),
    )
}

#[derive(Serialize)]
struct ServiceModeResponse {
    visibility: PanelVisibility,
    outcome: CallOutcome<bool>,
}

async fn service_mode(State(state): State<AppState>) -> Json<ServiceModeResponse> {
    let query = state.service_mode.query_service_mode().await;
    Json(ServiceModeResponse {
        visibility: PanelVisibility::from_query(&query),
        outcome: query.into(),
    })
}

async fn activate_service_mode(State(state): State<AppState>) -> Json<CallOutcome<String>> {
    Json(state.service_mode.activate_service_mode().await.into())
}

async fn ws_telemetry(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state.display))
}

async fn handle_ws(mut socket: WebSocket, display: DisplayUpdater) {
    let mut rx = display.subscribe();
    let watchers = display.watchers();
    tracing::debug!("Browser connected ({watchers} watching)");
    if send_frame(&mut socket, &display.snapshot()).await.is_err() {
        return;
    }
    loop {
        let frame = tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
            next = rx.recv() => match next {
                Ok(frame) => frame,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Browser lagged behind by {skipped} frames");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
        };
        if send_frame(&mut socket, &frame).await.is_err() {
            break;
        }
    }
    tracing::debug!("Browser disconnected");
}

async fn send_frame(socket: &mut WebSocket, frame: &ChartFrame) -> Result<(), ()> {
    let payload = serde_json::to_string(frame).map_err(|_| ())?;
    socket.send(Message::Text(payload)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{spawn_device, unused_addr};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{TimeZone, Utc};
    use futures::StreamExt;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
    use tower::ServiceExt;

    type Browser = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    fn state_for(device_host: String) -> AppState {
        let config = AppConfig::from_lookup(|key| match key {
            "DEVICE_HOST" => Some(device_host.clone()),
            _ => None,
        });
        AppState {
            service_mode: ServiceModeClient::new(config.device_base_url()),
            config: Arc::new(config),
            display: DisplayUpdater::new(),
        }
    }

    async fn offline_state() -> AppState {
        state_for(unused_addr().await.to_string())
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn telemetry_returns_current_frame() {
        let state = offline_state().await;
        state.display.update(23.456);

        let response = router(state).oneshot(get_request("/api/telemetry")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["latest"], "23.46");
        assert_eq!(json["values"], serde_json::json!([23.456]));
        assert_eq!(json["link"], "connecting");
    }

    #[tokio::test]
    async fn csv_export_lists_window() {
        let state = offline_state().await;
        let at = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        state.display.update_at(20.0, &at);

        let response = router(state).oneshot(get_request("/api/series.csv")).await.unwrap();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert_eq!(
            body_text(response).await,
            "timestamp,temperature_c\n03/02/2025 04:05:06,20.00\n"
        );
    }

    #[tokio::test]
    async fn unreachable_device_keeps_panel_hidden() {
        let state = offline_state().await;

        let response = router(state).oneshot(get_request("/api/service-mode")).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["visibility"], "hidden");
        assert_eq!(json["outcome"]["status"], "failed");
    }

    #[tokio::test]
    async fn index_renders_panel_from_device_flag() {
        let device = Router::new().route(
            "/is_service_mode",
            get(|| async { r#"{"serviceMode": true}"# }),
        );
        let addr = spawn_device(device).await;
        let state = state_for(addr.to_string());

        let response = router(state).oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Activate service mode"));
        assert!(!html.contains("card hidden"));
    }

    #[tokio::test]
    async fn activation_is_proxied_to_device() {
        let device = Router::new().route(
            "/activate_service_mode",
            get(|| async { "Service mode activated." }),
        );
        let addr = spawn_device(device).await;
        let state = state_for(addr.to_string());

        let request = Request::builder()
            .method("POST")
            .uri("/api/service-mode/activate")
            .body(Body::empty())
            .unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "ok", "value": "Service mode activated."})
        );
    }

    async fn next_frame(browser: &mut Browser) -> serde_json::Value {
        loop {
            match browser.next().await.unwrap().unwrap() {
                WsMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn ws_sends_snapshot_then_each_frame() {
        let state = offline_state().await;
        let at = Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap();
        state.display.update_at(20.0, &at);
        let addr = spawn_device(router(state.clone())).await;

        let (mut browser, _) = connect_async(format!("ws://{addr}/ws/telemetry"))
            .await
            .unwrap();
        let snapshot = next_frame(&mut browser).await;
        assert_eq!(snapshot["values"], serde_json::json!([20.0]));
        assert_eq!(snapshot["latest"], "20.00");

        state.display.update(21.125);
        let update = next_frame(&mut browser).await;
        assert_eq!(update["values"], serde_json::json!([20.0, 21.125]));
        assert_eq!(update["latest"], "21.13");
    }

    #[tokio::test]
    async fn ws_task_ends_when_browser_closes() {
        let state = offline_state().await;
        let addr = spawn_device(router(state.clone())).await;

        let (mut browser, _) = connect_async(format!("ws://{addr}/ws/telemetry"))
            .await
            .unwrap();
        next_frame(&mut browser).await;
        assert_eq!(state.display.watchers(), 1);

        browser.close(None).await.unwrap();
        for _ in 0..100 {
            if state.display.watchers() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.display.watchers(), 0);
    }
}
