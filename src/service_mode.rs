use serde::{Deserialize, Serialize};

pub const QUERY_PATH: &str = "/is_service_mode";
pub const ACTIVATE_PATH: &str = "/activate_service_mode";

#[derive(Debug, thiserror::Error)]
pub enum ServiceModeError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} answered with HTTP {status}")]
    Status { path: &'static str, status: u16 },
    #[error("malformed response from {path}: {reason}")]
    Malformed { path: &'static str, reason: String },
}

#[derive(Deserialize)]
struct ServiceModeBody {
    #[serde(rename = "serviceMode")]
    service_mode: bool,
}

/// Extracts the `serviceMode` flag; extra fields are ignored.
pub fn parse_service_mode(body: &str) -> Result<bool, String> {
    serde_json::from_str::<ServiceModeBody>(body)
        .map(|parsed| parsed.service_mode)
        .map_err(|err| err.to_string())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PanelVisibility {
    Shown,
    #[default]
    Hidden,
}

impl PanelVisibility {
    /// Any failure keeps the panel closed.
    pub fn from_query(result: &Result<bool, ServiceModeError>) -> Self {
        match result {
            Ok(true) => PanelVisibility::Shown,
            Ok(false) | Err(_) => PanelVisibility::Hidden,
        }
    }

    pub fn is_shown(self) -> bool {
        self == PanelVisibility::Shown
    }
}

/// Result shape handed to the page for both mode calls.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum CallOutcome<T> {
    Ok { value: T },
    Failed { reason: String },
}

impl<T> From<Result<T, ServiceModeError>> for CallOutcome<T> {
    fn from(result: Result<T, ServiceModeError>) -> Self {
        match result {
            Ok(value) => CallOutcome::Ok { value },
            Err(err) => CallOutcome::Failed {
                reason: err.to_string(),
            },
        }
    }
}

#[derive(Clone)]
pub struct ServiceModeClient {
    http: reqwest::Client,
    base_url: String,
}

impl ServiceModeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn query_service_mode(&self) -> Result<bool, ServiceModeError> {
        let body = self.get_text(QUERY_PATH).await?;
        let result = parse_service_mode(&body).map_err(|reason| ServiceModeError::Malformed {
            path: QUERY_PATH,
            reason,
        });
        match &result {
            Ok(flag) => tracing::debug!("Device service mode: {flag}"),
            Err(err) => tracing::warn!("Service mode query failed: {err}"),
        }
        result
    }

    pub async fn activate_service_mode(&self) -> Result<String, ServiceModeError> {
        let result = self.get_text(ACTIVATE_PATH).await;
        match &result {
            Ok(message) => tracing::info!("Service mode activation answered: {message}"),
            Err(err) => tracing::warn!("Service mode activation failed: {err}"),
        }
        result
    }

    async fn get_text(&self, path: &'static str) -> Result<String, ServiceModeError> {
        let transport = |source: reqwest::Error| ServiceModeError::Transport { path, source };
        let response = self
            .http
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceModeError::Status {
                path,
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(transport)
    }
}
