// ⚙️ Configuration - environment (and .env) settings, read once at startup
// Binaries apply their CLI overrides on top of what `AppConfig::load` returns.

use crate::eligibility::{EligibilityPolicy, UnknownPolicy};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Winners per draw when nothing is configured
pub const DEFAULT_MAX_WINNERS: usize = 4;

/// Top-level configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub draw: DrawConfig,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_path =
            PathBuf::from(env::var("DATABASE_PATH").unwrap_or_else(|_| "contest.db".to_string()));

        let policy = match env::var("DRAW_POLICY") {
            Ok(value) => value.parse::<EligibilityPolicy>().map_err(ConfigError::InvalidPolicy)?,
            Err(_) => EligibilityPolicy::default(),
        };

        let max_winners = env::var("MAX_WINNERS")
            .unwrap_or_else(|_| DEFAULT_MAX_WINNERS.to_string())
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::InvalidMaxWinners)?;

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let clear_password = env::var("CLEAR_DB_PASSWORD").ok().filter(|p| !p.is_empty());
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            database_path,
            draw: DrawConfig {
                policy,
                max_winners,
            },
            server: ServerConfig {
                host,
                port,
                clear_password,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Deployment-wide draw settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawConfig {
    pub policy: EligibilityPolicy,
    pub max_winners: usize,
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Clear-all is disabled when unset
    pub clear_password: Option<String>,
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

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DRAW_POLICY: {0}")]
    InvalidPolicy(#[source] UnknownPolicy),
    #[error("MAX_WINNERS must be a positive integer")]
    InvalidMaxWinners,
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
}
