use std::env;
use std::path::PathBuf;

pub struct AppConfig {
    pub device_host: String,
    pub http_bind: String,
    pub series_csv_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            device_host: var("DEVICE_HOST", "192.168.4.1"),
            http_bind: var("HTTP_BIND", "0.0.0.0:8080"),
            series_csv_path: lookup("SERIES_CSV_PATH")
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Telemetry socket exposed by the device firmware.
    pub fn telemetry_url(&self) -> String {
        format!("ws://{}/ws", self.device_host)
    }

    pub fn device_base_url(&self) -> String {
        format!("http://{}", self.device_host)
    }
}
