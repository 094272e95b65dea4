use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflows::assignment::{AssignmentSettings, CapacityThresholds};

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
    pub assignment: AssignmentConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            assignment: AssignmentConfig::from_env()?,
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

/// Lead assignment engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentConfig {
    pub rules_path: PathBuf,
    pub directory_timeout: Duration,
    pub default_thresholds: CapacityThresholds,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("data/assignment-rules.json"),
            directory_timeout: Duration::from_millis(2000),
            default_thresholds: CapacityThresholds::default(),
        }
    }
}

impl AssignmentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let rules_path = env::var("ASSIGNMENT_RULES_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.rules_path);

        let directory_timeout = match env::var("ASSIGNMENT_DIRECTORY_TIMEOUT_MS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(millis) if millis > 0 => Duration::from_millis(millis),
                _ => return Err(ConfigError::InvalidTimeout),
            },
            Err(_) => defaults.directory_timeout,
        };

        let default_thresholds = match env::var("ASSIGNMENT_DEFAULT_THRESHOLDS") {
            Ok(raw) => parse_thresholds(&raw)?,
            Err(_) => defaults.default_thresholds,
        };

        Ok(Self {
            rules_path,
            directory_timeout,
            default_thresholds,
        })
    }

    pub fn settings(&self) -> AssignmentSettings {
        AssignmentSettings {
            directory_timeout: self.directory_timeout,
            default_thresholds: self.default_thresholds,
        }
    }
}

/// Parses `green,yellow,red` fractions.
fn parse_thresholds(raw: &str) -> Result<CapacityThresholds, ConfigError> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| ConfigError::InvalidThresholds {
            detail: format!("'{raw}' is not a list of numbers"),
        })?;

    let [green, yellow, red] = values[..] else {
        return Err(ConfigError::InvalidThresholds {
            detail: format!("expected three values, found {}", values.len()),
        });
    };

    let thresholds = CapacityThresholds { green, yellow, red };
    thresholds
        .check()
        .map_err(|detail| ConfigError::InvalidThresholds { detail })?;
    Ok(thresholds)
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidThresholds { detail: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => write!(
                f,
                "ASSIGNMENT_DIRECTORY_TIMEOUT_MS must be a positive number of milliseconds"
            ),
            ConfigError::InvalidThresholds { detail } => {
                write!(f, "ASSIGNMENT_DEFAULT_THRESHOLDS is invalid: {detail}")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTimeout
            | ConfigError::InvalidThresholds { .. } => None,
        }
    }
}
