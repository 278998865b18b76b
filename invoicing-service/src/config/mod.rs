//! Configuration module for invoicing-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

/// Where invoices are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown STORAGE_BACKEND '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Empty when the memory backend is selected.
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
}

impl InvoicingConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let storage = env::var("STORAGE_BACKEND")
            .ok()
            .map(|s| s.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::Postgres);

        let database_url = match (env::var("DATABASE_URL"), storage) {
            (Ok(url), _) => url,
            (Err(_), StorageBackend::Memory) => String::new(),
            (Err(_), StorageBackend::Postgres) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required"
                )))
            }
        };

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "invoicing-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            storage,
            database: DatabaseConfig {
                url: database_url,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
                run_migrations: env::var("DATABASE_RUN_MIGRATIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            auth: AuthConfig {
                jwt_secret: env::var("AUTH_JWT_SECRET")
                    .map(Secret::new)
                    .map_err(|_| {
                        AppError::ConfigError(anyhow::anyhow!("AUTH_JWT_SECRET is required"))
                    })?,
                jwt_issuer: env::var("AUTH_JWT_ISSUER").ok().filter(|s| !s.is_empty()),
                jwt_audience: env::var("AUTH_JWT_AUDIENCE").ok().filter(|s| !s.is_empty()),
            },
        })
    }

    /// In-process configuration with no database, for tests and local runs.
    pub fn in_memory(jwt_secret: &str) -> Self {
        Self {
            common: core_config::Config::default(),
            service_name: "invoicing-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            storage: StorageBackend::Memory,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                min_connections: 2,
                run_migrations: false,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret.to_string()),
                jwt_issuer: None,
                jwt_audience: None,
            },
        }
    }
}
