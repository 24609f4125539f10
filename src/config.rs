use std::{
    env, fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    time::Duration,
};

use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub const DEFAULT_DEPLOYMENT: &str = "gpt-4.1";
pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub extra_models: Vec<String>,
    pub log_level: LevelFilter,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
    pub default_top_p: f32,
    pub request_timeout: Duration,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Blank values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let endpoint = get("AZURE_FOUNDRY_ENDPOINT")
            .ok_or(ConfigError::Missing("AZURE_FOUNDRY_ENDPOINT"))?
            .trim_end_matches('/')
            .to_string();
        let api_key =
            get("AZURE_FOUNDRY_API_KEY").ok_or(ConfigError::Missing("AZURE_FOUNDRY_API_KEY"))?;

        let deployment =
            get("AZURE_FOUNDRY_DEPLOYMENT_NAME").unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string());
        let api_version =
            get("AZURE_FOUNDRY_API_VERSION").unwrap_or_else(|| DEFAULT_API_VERSION.to_string());
        let extra_models = split_list(
            &get("AZURE_FOUNDRY_MODELS").unwrap_or_else(|| "gpt-35-turbo".to_string()),
        );

        let host: IpAddr = parse_or("HOST", get("HOST"), IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port: u16 = parse_or("PORT", get("PORT"), 8000)?;
        let listen_addr = SocketAddr::new(host, port);

        let log_level = match get("LOG_LEVEL") {
            Some(raw) => parse_log_level(&raw)?,
            None => LevelFilter::INFO,
        };

        let default_max_tokens = parse_or("DEFAULT_MAX_TOKENS", get("DEFAULT_MAX_TOKENS"), 1000)?;
        let default_temperature =
            parse_or("DEFAULT_TEMPERATURE", get("DEFAULT_TEMPERATURE"), 0.7)?;
        let default_top_p = parse_or("DEFAULT_TOP_P", get("DEFAULT_TOP_P"), 0.95)?;
        let request_timeout =
            Duration::from_secs(parse_or("REQUEST_TIMEOUT", get("REQUEST_TIMEOUT"), 30)?);

        let allowed_origins = split_list(&get("ALLOWED_ORIGINS").unwrap_or_else(|| "*".into()));

        Ok(Self {
            listen_addr,
            endpoint,
            api_key,
            deployment,
            api_version,
            extra_models,
            log_level,
            default_max_tokens,
            default_temperature,
            default_top_p,
            request_timeout,
            allowed_origins,
        })
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("listen_addr", &self.listen_addr)
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("extra_models", &self.extra_models)
            .field("log_level", &self.log_level)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("default_temperature", &self.default_temperature)
            .field("default_top_p", &self.default_top_p)
            .field("request_timeout", &self.request_timeout)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Accepts tracing level names plus the Python logging spellings
/// `warning`, `critical` and `fatal`.
fn parse_log_level(raw: &str) -> Result<LevelFilter, ConfigError> {
    let lower = raw.to_lowercase();
    let name = match lower.as_str() {
        "warning" => "warn",
        "critical" | "fatal" => "error",
        other => other,
    };
    name.parse().map_err(|_| ConfigError::Invalid {
        name: "LOG_LEVEL",
        value: raw.to_string(),
    })
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
