use std::path::Path;

use anyhow::{ensure, Context};
use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

pub const DEFAULT_ISSUER: &str = "bookclub";
pub const DEFAULT_TTL_MINUTES: i64 = 60;
/// One year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection string; takes precedence over the individual parts.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub db_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Parts are passed to the driver as-is, so credentials need no escaping.
    /// `host` may carry a `:port` suffix.
    pub fn connect_options(&self) -> anyhow::Result<PgConnectOptions> {
        if let Some(url) = &self.url {
            return url
                .parse::<PgConnectOptions>()
                .context("parse database url");
        }

        let mut options = PgConnectOptions::new()
            .username(&self.username)
            .password(&self.password)
            .database(&self.db_name);
        let with_port = self
            .host
            .rsplit_once(':')
            .and_then(|(host, port)| Some((host, port.parse::<u16>().ok()?)));
        match with_port {
            Some((host, port)) => options = options.host(host).port(port),
            None if !self.host.is_empty() => options = options.host(&self.host),
            None => {}
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_issuer")]
    pub issuer: String,
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: default_issuer(),
            ttl_minutes: DEFAULT_TTL_MINUTES,
        }
    }
}

/// Argon2 cost parameters. Defaults follow the Argon2id recommendation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            request_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub password: PasswordConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_max_connections() -> u32 {
    10
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.into()
}

fn default_ttl_minutes() -> i64 {
    DEFAULT_TTL_MINUTES
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(fallback)
}

impl AppConfig {
    /// Reads `APP_CONFIG` as a JSON file when set, otherwise the environment.
    pub fn load() -> anyhow::Result<Self> {
        let config = match std::env::var("APP_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL").ok(),
            host: std::env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".into()),
            db_name: std::env::var("DATABASE_NAME").unwrap_or_else(|_| "bookclub".into()),
            username: std::env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".into()),
            password: std::env::var("DATABASE_PASSWORD").unwrap_or_default(),
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", default_max_connections()),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| default_issuer()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", DEFAULT_TTL_MINUTES),
        };
        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: env_or("ARGON2_PARALLELISM", defaults.parallelism),
        };
        let server_defaults = ServerConfig::default();
        let server = ServerConfig {
            host: std::env::var("APP_HOST").unwrap_or(server_defaults.host),
            port: env_or("APP_PORT", server_defaults.port),
            request_timeout_secs: env_or(
                "REQUEST_TIMEOUT_SECS",
                server_defaults.request_timeout_secs,
            ),
        };
        Ok(Self {
            database,
            jwt,
            password,
            server,
        })
    }

    /// Loads a JSON config file. A secret missing from the file is taken
    /// from `JWT_SECRET`.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let mut config = Self::from_json(&raw)
            .with_context(|| format!("parse config file {}", path.display()))?;
        if config.jwt.secret.is_empty() {
            config.jwt.secret = std::env::var("JWT_SECRET").unwrap_or_default();
        }
        Ok(config)
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.jwt.secret.is_empty(), "jwt secret must not be empty");
        ensure!(self.jwt.ttl_minutes > 0, "jwt ttl must be positive");
        ensure!(
            self.jwt.ttl_minutes <= MAX_TTL_MINUTES,
            "jwt ttl must not exceed {} minutes",
            MAX_TTL_MINUTES
        );
        ensure!(
            self.server.request_timeout_secs > 0,
            "request timeout must be positive"
        );
        Ok(())
    }
}
