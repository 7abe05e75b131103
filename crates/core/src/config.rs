use serde::Deserialize;
use url::Url;

/// Root configuration. Loaded from environment variables with the prefix
/// `ADFORGE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// REST base URL, including any API path prefix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// A job pending longer than this transitions to `Failed(Timeout)`.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    /// How often the timeout watchdog sweeps pending jobs.
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}
fn default_request_timeout_ms() -> u64 {
    15_000
}
fn default_reconnect_base_ms() -> u64 {
    500
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_job_timeout_secs() -> u64 {
    120
}
fn default_watchdog_interval_ms() -> u64 {
    5_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: default_job_timeout_secs(),
            watchdog_interval_ms: default_watchdog_interval_ms(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            realtime: RealtimeConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ADFORGE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

/// Derive the realtime channel origin from the REST base URL.
///
/// The event channel lives at the service origin, not under the REST path
/// prefix, so any API path suffix is stripped:
/// `https://api.example.com/api/v1` becomes `https://api.example.com`.
pub fn realtime_origin(base_url: &str) -> crate::error::AdForgeResult<String> {
    let parsed = Url::parse(base_url)
        .map_err(|e| crate::error::AdForgeError::Fetch(format!("invalid base URL: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| crate::error::AdForgeError::Fetch("base URL has no host".to_string()))?;

    let mut origin = format!("{}://{}", parsed.scheme(), host);
    if let Some(port) = parsed.port() {
        origin.push_str(&format!(":{port}"));
    }
    Ok(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.generation.job_timeout_secs, 120);
        assert!(config.api.base_url.starts_with("http"));
        assert!(config.realtime.reconnect_base_ms < config.realtime.reconnect_max_ms);
    }

    #[test]
    fn test_realtime_origin_strips_api_path() {
        assert_eq!(
            realtime_origin("https://api.example.com/api/v1").unwrap(),
            "https://api.example.com"
        );
        assert_eq!(
            realtime_origin("http://localhost:8080/api").unwrap(),
            "http://localhost:8080"
        );
        assert_eq!(
            realtime_origin("https://api.example.com").unwrap(),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_realtime_origin_rejects_garbage() {
        assert!(realtime_origin("not a url").is_err());
    }
}
