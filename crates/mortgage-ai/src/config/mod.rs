use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::Secret;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the origination backend.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub origination: OriginationConfig,
    pub model: ModelConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let default_owner = env::var("APP_DEFAULT_OWNER")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| OriginationConfig::DEFAULT_OWNER.to_string());
        let id_attempts = match env::var("APP_ID_ATTEMPTS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or(ConfigError::InvalidIdAttempts)?,
            Err(_) => OriginationConfig::DEFAULT_ID_ATTEMPTS,
        };

        let api_key = env::var("APP_MODEL_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(Secret::new);
        let base_url = env::var("APP_MODEL_BASE_URL")
            .unwrap_or_else(|_| ModelConfig::DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let model_name =
            env::var("APP_MODEL_NAME").unwrap_or_else(|_| ModelConfig::DEFAULT_MODEL.to_string());
        let timeout = match env::var("APP_MODEL_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidModelTimeout)?,
            Err(_) => ModelConfig::DEFAULT_TIMEOUT,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            origination: OriginationConfig {
                default_owner,
                id_attempts,
            },
            model: ModelConfig {
                api_key,
                base_url,
                model: model_name,
                timeout,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the origination service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginationConfig {
    /// Account that owns applications when the caller supplies no username.
    pub default_owner: String,
    /// How many random identifiers to try before giving up on allocation.
    pub id_attempts: u32,
}

impl OriginationConfig {
    pub const DEFAULT_OWNER: &'static str = "admin";
    pub const DEFAULT_ID_ATTEMPTS: u32 = 32;
}

impl Default for OriginationConfig {
    fn default() -> Self {
        Self {
            default_owner: Self::DEFAULT_OWNER.to_string(),
            id_attempts: Self::DEFAULT_ID_ATTEMPTS,
        }
    }
}

/// Chat-completions endpoint backing document classification and recommendations.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Without a key the service falls back to offline document handling.
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl ModelConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidIdAttempts,
    InvalidModelTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidIdAttempts => {
                write!(f, "APP_ID_ATTEMPTS must be a positive integer")
            }
            ConfigError::InvalidModelTimeout => {
                write!(f, "APP_MODEL_TIMEOUT_SECS must be a positive number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidIdAttempts
            | ConfigError::InvalidModelTimeout => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
