use std::env;
use std::fmt;

/// Issuer stamped into every token when `JWT_ISSUER` is not set.
pub const DEFAULT_ISSUER: &str = "tasklane";

/// Application configuration, built once at startup and handed to the components
/// that need it (token service, connection pool, HTTP server).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub refresh_token_secret: String,
    pub jwt_issuer: String,
    pub bcrypt_cost: u32,
    /// Allowed CORS origin. Any origin is accepted when unset.
    pub client_url: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has invalid value {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 5)?,
            server_port: parse_or(get("SERVER_PORT"), "SERVER_PORT", 8080)?,
            server_host: get("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            jwt_secret: required("JWT_SECRET")?,
            refresh_token_secret: required("REFRESH_TOKEN_SECRET")?,
            jwt_issuer: get("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            bcrypt_cost: bcrypt_cost(get("BCRYPT_COST"))?,
            client_url: get("CLIENT_URL"),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}

/// bcrypt only accepts costs in `4..=31`.
fn bcrypt_cost(value: Option<String>) -> Result<u32, ConfigError> {
    let raw = value.clone();
    let cost = parse_or(value, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
    if (4..=31).contains(&cost) {
        Ok(cost)
    } else {
        Err(ConfigError::Invalid {
            key: "BCRYPT_COST",
            value: raw.unwrap_or_default(),
        })
    }
}
