use crate::error::AppError;
use dotenvy::dotenv;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DB_MAX_CONNECTIONS: usize = 16;
const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_DB_ACQUIRE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 5;
const DEFAULT_CLIENT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub jwt_secret: String,
    /// Clock skew tolerated when checking token expiry
    pub jwt_leeway_secs: u64,
    /// Postgres connection string; the in-memory store is used when unset
    pub database_url: Option<String>,
    pub db_max_connections: usize,
    /// Upper bound on opening a new Postgres connection
    pub db_connect_timeout: Duration,
    /// Upper bound on waiting for a free pooled connection
    pub db_acquire_timeout: Duration,
    pub cors_allowed_origin: String,
    /// Send relayed messages back to the sending connection as well
    pub relay_echo_to_origin: bool,
    /// Fan REST-posted messages out to live sessions
    pub rest_broadcast: bool,
    pub ws_heartbeat_interval: Duration,
    pub ws_client_timeout: Duration,
}

// Hand-written so the secret never reaches the logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("jwt_leeway_secs", &self.jwt_leeway_secs)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("db_max_connections", &self.db_max_connections)
            .field("db_connect_timeout", &self.db_connect_timeout)
            .field("db_acquire_timeout", &self.db_acquire_timeout)
            .field("cors_allowed_origin", &self.cors_allowed_origin)
            .field("relay_echo_to_origin", &self.relay_echo_to_origin)
            .field("rest_broadcast", &self.rest_broadcast)
            .field("ws_heartbeat_interval", &self.ws_heartbeat_interval)
            .field("ws_client_timeout", &self.ws_client_timeout)
            .finish()
    }
}

impl Config {
    /// Defaults for everything but the secret
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: jwt_secret.into(),
            jwt_leeway_secs: 0,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            db_connect_timeout: Duration::from_secs(DEFAULT_DB_CONNECT_TIMEOUT_SECS),
            db_acquire_timeout: Duration::from_secs(DEFAULT_DB_ACQUIRE_TIMEOUT_SECS),
            cors_allowed_origin: "*".to_string(),
            relay_echo_to_origin: true,
            rest_broadcast: false,
            ws_heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            ws_client_timeout: Duration::from_secs(DEFAULT_CLIENT_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| AppError::Config("JWT_SECRET missing".into()))?;
        let mut cfg = Self::with_secret(jwt_secret);

        if let Some(port) = parse(&var, "PORT")? {
            cfg.port = port;
        }
        if let Some(leeway) = parse(&var, "JWT_LEEWAY_SECS")? {
            cfg.jwt_leeway_secs = leeway;
        }
        cfg.database_url = var("DATABASE_URL");
        if let Some(max) = parse(&var, "DB_MAX_CONNECTIONS")? {
            cfg.db_max_connections = max;
        }
        if let Some(secs) = parse::<u64>(&var, "DB_CONNECT_TIMEOUT_SECS")? {
            cfg.db_connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64>(&var, "DB_ACQUIRE_TIMEOUT_SECS")? {
            cfg.db_acquire_timeout = Duration::from_secs(secs);
        }
        if let Some(origin) = var("CORS_ALLOWED_ORIGIN") {
            cfg.cors_allowed_origin = origin;
        }
        if let Some(echo) = parse_flag(&var, "RELAY_ECHO_TO_ORIGIN")? {
            cfg.relay_echo_to_origin = echo;
        }
        if let Some(broadcast) = parse_flag(&var, "REST_BROADCAST")? {
            cfg.rest_broadcast = broadcast;
        }
        if let Some(secs) = parse::<u64>(&var, "WS_HEARTBEAT_INTERVAL_SECS")? {
            cfg.ws_heartbeat_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse::<u64>(&var, "WS_CLIENT_TIMEOUT_SECS")? {
            cfg.ws_client_timeout = Duration::from_secs(secs);
        }

        if cfg.ws_client_timeout <= cfg.ws_heartbeat_interval {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_INTERVAL_SECS".into(),
            ));
        }
        if cfg.db_max_connections == 0 {
            return Err(AppError::Config("DB_MAX_CONNECTIONS must be positive".into()));
        }
        if cfg.db_connect_timeout.is_zero() || cfg.db_acquire_timeout.is_zero() {
            return Err(AppError::Config(
                "DB_CONNECT_TIMEOUT_SECS and DB_ACQUIRE_TIMEOUT_SECS must be positive".into(),
            ));
        }

        Ok(cfg)
    }
}

fn parse<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, AppError> {
    var(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| AppError::Config(format!("{key} has invalid value {raw:?}")))
        })
        .transpose()
}

fn parse_flag(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<bool>, AppError> {
    var(key)
        .map(|raw| match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Config(format!("{key} must be a boolean, got {raw:?}"))),
        })
        .transpose()
}
