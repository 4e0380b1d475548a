use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::auth::BasicCredentials;
use crate::workflows::enrollment::CachePolicy;

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub brackets: BracketConfig,
    pub processing: ProcessingConfig,
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

        let credentials = match (
            env::var("BASIC_AUTH_USERNAME").ok(),
            env::var("BASIC_AUTH_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Some(BasicCredentials::new(username, password)),
            (None, None) if environment == AppEnvironment::Production => {
                return Err(ConfigError::MissingCredentials)
            }
            (None, None) => None,
            _ => return Err(ConfigError::PartialCredentials),
        };

        let ttl = Duration::from_secs(numeric_var("APP_BRACKET_CACHE_TTL_SECS", 60)?);
        let cache_policy = match env::var("APP_BRACKET_CACHE") {
            Ok(raw) => parse_cache_policy(&raw, ttl)?,
            Err(_) => CachePolicy::Disabled,
        };

        let processing = ProcessingConfig {
            delay: Duration::from_millis(numeric_var("APP_PROCESSING_DELAY_MS", 4000)?),
            batch_size: numeric_var("APP_QUEUE_BATCH_SIZE", 10)?,
            visibility_timeout: Duration::from_secs(numeric_var(
                "APP_QUEUE_VISIBILITY_TIMEOUT_SECS",
                30,
            )?),
            max_receives: numeric_var("APP_QUEUE_MAX_RECEIVES", 3)?,
            poll_interval: Duration::from_millis(numeric_var("APP_QUEUE_POLL_INTERVAL_MS", 500)?),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            auth: AuthConfig { credentials },
            brackets: BracketConfig { cache_policy },
            processing,
        })
    }
}

fn numeric_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var: name }),
        Err(_) => Ok(default),
    }
}

fn parse_cache_policy(raw: &str, ttl: Duration) -> Result<CachePolicy, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "none" | "disabled" => Ok(CachePolicy::Disabled),
        "lazy" | "manual" => Ok(CachePolicy::Lazy),
        "ttl" => Ok(CachePolicy::Ttl(ttl)),
        _ => Err(ConfigError::InvalidCachePolicy {
            value: raw.to_string(),
        }),
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

/// Static credential pair guarding the API routes. `None` leaves the gate open.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub credentials: Option<BasicCredentials>,
}

#[derive(Debug, Clone)]
pub struct BracketConfig {
    pub cache_policy: CachePolicy,
}

/// Queue consumer and processor tuning.
#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    pub delay: Duration,
    pub batch_size: usize,
    pub visibility_timeout: Duration,
    pub max_receives: u32,
    pub poll_interval: Duration,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(4),
            batch_size: 10,
            visibility_timeout: Duration::from_secs(30),
            max_receives: 3,
            poll_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
    InvalidCachePolicy { value: String },
    PartialCredentials,
    MissingCredentials,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a non-negative integer")
            }
            ConfigError::InvalidCachePolicy { value } => write!(
                f,
                "APP_BRACKET_CACHE must be one of none, lazy, ttl (got '{value}')"
            ),
            ConfigError::PartialCredentials => write!(
                f,
                "BASIC_AUTH_USERNAME and BASIC_AUTH_PASSWORD must be set together"
            ),
            ConfigError::MissingCredentials => write!(
                f,
                "BASIC_AUTH_USERNAME and BASIC_AUTH_PASSWORD are required in production"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "BASIC_AUTH_USERNAME",
            "BASIC_AUTH_PASSWORD",
            "APP_BRACKET_CACHE",
            "APP_BRACKET_CACHE_TTL_SECS",
            "APP_PROCESSING_DELAY_MS",
            "APP_QUEUE_BATCH_SIZE",
            "APP_QUEUE_VISIBILITY_TIMEOUT_SECS",
            "APP_QUEUE_MAX_RECEIVES",
            "APP_QUEUE_POLL_INTERVAL_MS",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.auth.credentials.is_none());
        assert_eq!(config.brackets.cache_policy, CachePolicy::Disabled);
        assert_eq!(config.processing.delay, Duration::from_secs(4));
        assert_eq!(config.processing.max_receives, 3);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn parses_ttl_cache_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_BRACKET_CACHE", "ttl");
        env::set_var("APP_BRACKET_CACHE_TTL_SECS", "15");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.brackets.cache_policy,
            CachePolicy::Ttl(Duration::from_secs(15))
        );
    }

    #[test]
    fn rejects_unknown_cache_policy() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_BRACKET_CACHE", "forever");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidCachePolicy { .. })
        ));
    }

    #[test]
    fn credentials_must_be_paired() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BASIC_AUTH_USERNAME", "admin");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::PartialCredentials)
        ));
    }

    #[test]
    fn production_requires_credentials() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::MissingCredentials)
        ));

        env::set_var("BASIC_AUTH_USERNAME", "admin");
        env::set_var("BASIC_AUTH_PASSWORD", "secret");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert!(config.auth.credentials.is_some());
    }

    #[test]
    fn rejects_non_numeric_batch_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_QUEUE_BATCH_SIZE", "ten");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidNumber {
                var: "APP_QUEUE_BATCH_SIZE"
            })
        ));
    }
}
