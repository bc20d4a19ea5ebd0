//! # configs
//!
//! Layered application settings. Later layers win:
//! 1. Built-in defaults
//! 2. `config/default.toml` (optional)
//! 3. `config/{APP_ENV}.toml` (optional, `APP_ENV` defaults to `development`)
//! 4. Environment variables prefixed `INSPIRE__`, e.g.
//!    `INSPIRE__DATABASE__URL` or `INSPIRE__SERVER__PORT`
//!
//! A `.env` file in the working directory is loaded first, so its entries
//! behave like real environment variables.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "INSPIRE";
pub const ENV_SEPARATOR: &str = "__";

#[derive(Error, Debug)]
pub enum ConfigsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: SecretString,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    pub issuer: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub avatar_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
    /// JSON lines instead of the human-readable formatter.
    pub json: bool,
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub log: LogConfig,
}

impl AppConfig {
    /// Loads `.env`, then every layer from `./config` and the process environment.
    pub fn load() -> Result<Self, ConfigsError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        Self::build(Path::new("config"), &app_env, env_source())
    }

    /// Builds from an explicit config directory and environment source.
    pub fn build(dir: &Path, app_env: &str, env: Environment) -> Result<Self, ConfigsError> {
        let settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("database.url", "postgres://localhost/inspire_feed")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.jwt_secret", "")?
            .set_default("auth.issuer", "inspire-feed")?
            .set_default("auth.token_ttl_secs", 86_400)?
            .set_default("media.avatar_root", "./data/avatars")?
            .set_default("log.filter", "info,tower_http=debug")?
            .set_default("log.json", false)?
            .add_source(File::from(dir.join("default.toml")).required(false))
            .add_source(File::from(dir.join(format!("{app_env}.toml"))).required(false))
            .add_source(env)
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigsError> {
        if self.auth.jwt_secret.expose_secret().is_empty() {
            return Err(ConfigsError::Invalid("auth.jwt_secret must be set".into()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigsError::Invalid(
                "database.max_connections must be positive".into(),
            ));
        }
        if self.auth.token_ttl_secs <= 0 {
            return Err(ConfigsError::Invalid(
                "auth.token_ttl_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

/// The `INSPIRE__SECTION__KEY` environment source.
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
