use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "HMS";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 60;
pub const DEFAULT_REFRESH_TOKEN_TTL_HOURS: i64 = 168;
pub const DATABASE_FILE: &str = "hms.db";

/// Application data directory: `<platform data dir>/HMS`, falling back to
/// the working directory when the platform reports none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default database location.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join(DATABASE_FILE)
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "info,hms_lib=debug"
    } else {
        "info"
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Credentials for the administrator created at startup when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
    pub email: String,
}

/// Runtime settings, read from `HMS_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Allowed browser origin; CORS stays off when `None`.
    pub cors_origin: Option<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = get("HMS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "HMS_BIND_ADDR",
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let database_path = get("HMS_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let access_minutes = parse_positive(
            "HMS_ACCESS_TOKEN_TTL_MINUTES",
            get("HMS_ACCESS_TOKEN_TTL_MINUTES"),
            DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
        )?;
        let refresh_hours = parse_positive(
            "HMS_REFRESH_TOKEN_TTL_HOURS",
            get("HMS_REFRESH_TOKEN_TTL_HOURS"),
            DEFAULT_REFRESH_TOKEN_TTL_HOURS,
        )?;

        let bootstrap_admin = match (get("HMS_ADMIN_USERNAME"), get("HMS_ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(BootstrapAdmin {
                email: get("HMS_ADMIN_EMAIL").unwrap_or_default(),
                username,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr,
            database_path,
            access_token_ttl: Duration::minutes(access_minutes),
            refresh_token_ttl: Duration::hours(refresh_hours),
            cors_origin: get("HMS_CORS_ORIGIN"),
            bootstrap_admin,
        })
    }
}

fn parse_positive(var: &'static str, raw: Option<String>, default: i64) -> Result<i64, ConfigError> {
    let Some(raw) = raw else { return Ok(default) };
    match raw.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        Ok(_) => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "must be a positive integer".into(),
        }),
        Err(e) => Err(ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value: raw,
        }),
    }
}
