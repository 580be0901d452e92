// Configuration module entry point
// Loads layered configuration and builds the shared runtime state

mod state;
mod types;

use std::net::{SocketAddr, ToSocketAddrs};
use thiserror::Error;

// Re-export public types
pub use state::AppState;
pub use types::{
    Config, FetchConfig, HealthConfig, HttpConfig, LogFormat, LoggingConfig, PerformanceConfig,
    RendererConfig, RoutesConfig, ServerConfig,
};

/// Environment variable names understood for compatibility with existing
/// Pixlet deployments, mapped to their configuration keys.
const LEGACY_ENV_KEYS: [(&str, &str); 5] = [
    ("PIXLET_BINARY", "renderer.binary"),
    ("PIXLET_BINARY_PATH", "renderer.binary_path"),
    ("LD_LIBRARY_PATH", "renderer.library_path"),
    ("HOST", "server.host"),
    ("PORT", "server.port"),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("Invalid address '{addr}': {reason}")]
    Address { addr: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl Config {
    /// Load configuration from specified file path (without extension)
    /// Default config file is "config.toml" when no path specified
    pub fn load_from(config_path: &str) -> Result<Self, ConfigError> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load_from`] with an explicit lookup for the legacy
    /// environment names.
    pub fn load_with<F>(config_path: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("AXILLA")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "localhost")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "full")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 60)?
            .set_default("performance.write_timeout", 120)?
            .set_default("http.server_name", "axilla")?
            .set_default("renderer.binary", "pixlet")?
            .set_default("renderer.assets_dir", "assets")?
            .set_default("fetch.max_size", 10_000_000)? // 10 MB
            .set_default("fetch.timeout_secs", 30)?
            .set_default("routes.static_dir", "static")?
            .set_default("routes.index_files", vec!["index.html"])?;

        for (key, value) in legacy_overrides(lookup) {
            builder = builder.set_override(key, value)?;
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        let invalid = |reason: String| ConfigError::Address {
            addr: addr.clone(),
            reason,
        };
        (self.server.host.as_str(), self.server.port)
            .to_socket_addrs()
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid("no address resolved".to_string()))
    }
}

/// Collect overrides from the legacy environment names. Empty values are
/// treated as unset.
fn legacy_overrides<F>(lookup: F) -> Vec<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    LEGACY_ENV_KEYS
        .iter()
        .filter_map(|(env, key)| {
            lookup(env)
                .filter(|value| !value.is_empty())
                .map(|value| (*key, value))
        })
        .collect()
}
