use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend root, without trailing slash (e.g. `http://localhost:8000/api`)
    pub base_url: String,
    pub pool_idle_timeout_seconds: u64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the persisted token store
    pub data_dir: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            pool_idle_timeout_seconds: 30,
            timeout_seconds: 10,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ApiConfig::default();

        let base_url = std::env::var("API_BASE_URL").unwrap_or(defaults.base_url);

        let timeout_seconds = std::env::var("API_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.timeout_seconds);

        let data_dir = std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string());

        let config = Config {
            api: ApiConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                timeout_seconds,
                ..Default::default()
            },
            storage: StorageConfig { data_dir },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.api.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "API_BASE_URL must be an http(s) URL, got {base:?}"
            )));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "API_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        if self.storage.data_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "DATA_DIR cannot be empty".to_string(),
            ));
        }

        if base.starts_with("http://") && !is_loopback(base) {
            tracing::warn!(
                base_url = %base,
                "API_BASE_URL is plain http; bearer tokens will travel unencrypted"
            );
        }

        Ok(())
    }

    /// Build the shared HTTP client used by the session manager and gateway.
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .pool_idle_timeout(std::time::Duration::from_secs(
                self.api.pool_idle_timeout_seconds,
            ))
            .timeout(std::time::Duration::from_secs(self.api.timeout_seconds))
            .build()
    }
}

fn is_loopback(base_url: &str) -> bool {
    let rest = base_url.trim_start_matches("http://");
    rest.starts_with("localhost") || rest.starts_with("127.0.0.1") || rest.starts_with("[::1]")
}
