use serde::Serialize;
use sqlx::mysql::MySqlConnectOptions;
use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3306;
const DEFAULT_USER: &str = "root";
const DEFAULT_DATABASE: &str = "payroll_db";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the payroll database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub connect_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DATABASE.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl DbConfig {
    /// Loads `.env` (if present) and reads the `DB_*` variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Database target: {}", config.redacted());

        Ok(config)
    }

    /// Same parsing as [`DbConfig::from_env`] over an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("DB_HOST")
            .unwrap_or(defaults.host)
            .trim()
            .to_string();
        if host.is_empty() {
            return Err(AppError::Config("DB_HOST cannot be empty".to_string()));
        }

        let port = match lookup("DB_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| {
                    AppError::Config("DB_PORT must be a valid number between 1-65535".to_string())
                })?,
            None => defaults.port,
        };

        let user = lookup("DB_USER").unwrap_or(defaults.user);
        let password = lookup("DB_PASSWORD").unwrap_or_default();

        let database = lookup("DB_NAME")
            .unwrap_or(defaults.database)
            .trim()
            .to_string();
        if database.is_empty() {
            return Err(AppError::Config("DB_NAME cannot be empty".to_string()));
        }

        let connect_timeout = match lookup("DB_CONNECT_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .ok_or_else(|| {
                    AppError::Config(
                        "DB_CONNECT_TIMEOUT_SECS must be a positive number of seconds".to_string(),
                    )
                })?,
            None => defaults.connect_timeout,
        };

        Ok(Self {
            host,
            port,
            user,
            password,
            database,
            connect_timeout,
        })
    }

    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        options
    }

    /// `user:***@host:port/database`, safe to log.
    pub fn redacted(&self) -> String {
        let secret = if self.password.is_empty() { "" } else { ":***" };
        format!(
            "{}{}@{}:{}/{}",
            self.user, secret, self.host, self.port, self.database
        )
    }
}
