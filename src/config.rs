//! Runtime configuration read from environment variables
//!
//! `.env` files are loaded by `main` through dotenvy before this runs.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: String, value: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Requests still running after this many seconds are cancelled
    pub request_timeout_secs: u64,
}

impl HttpConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

/// PostgreSQL connection and pool settings
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Full connection URL; overrides the individual fields when set
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Maximum number of pooled connections
    pub pool_size: u32,
    pub connection_timeout_secs: u64,
    /// Server-side statement timeout, 0 disables it
    pub statement_timeout_ms: u64,
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn database_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "postgres".to_string(),
            pool_size: 20,
            connection_timeout_secs: 30,
            statement_timeout_ms: 0,
            run_migrations: true,
        }
    }
}

// Keeps the password out of logs
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("pool_size", &self.pool_size)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub logger_format: LogFormat,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let http_defaults = HttpConfig::default();
        let db_defaults = DatabaseConfig::default();

        Ok(Self {
            http: HttpConfig {
                host: get("HTTP_HOST").unwrap_or(http_defaults.host),
                port: parse_or(&get, "HTTP_PORT", http_defaults.port)?,
                request_timeout_secs: parse_or(
                    &get,
                    "REQUEST_TIMEOUT_SECS",
                    http_defaults.request_timeout_secs,
                )?,
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL"),
                host: get("POSTGRES_HOST").unwrap_or(db_defaults.host),
                port: parse_or(&get, "POSTGRES_PORT", db_defaults.port)?,
                user: get("POSTGRES_USER").unwrap_or(db_defaults.user),
                password: get("POSTGRES_PASSWORD").unwrap_or(db_defaults.password),
                name: get("POSTGRES_DB").unwrap_or(db_defaults.name),
                pool_size: parse_or(&get, "DB_POOL_MAX_SIZE", db_defaults.pool_size)?,
                connection_timeout_secs: parse_or(
                    &get,
                    "DB_CONNECTION_TIMEOUT_SECS",
                    db_defaults.connection_timeout_secs,
                )?,
                statement_timeout_ms: parse_or(
                    &get,
                    "DB_STATEMENT_TIMEOUT_MS",
                    db_defaults.statement_timeout_ms,
                )?,
                run_migrations: parse_or(&get, "DB_RUN_MIGRATIONS", db_defaults.run_migrations)?,
            },
            logger_format: parse_or(&get, "LOGGER_FORMAT", LogFormat::default())?,
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => {
            let parsed = value.trim().parse();
            parsed.map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value,
            })
        }
        None => Ok(default),
    }
}
