use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "dev-invoicing-secret-change-me";

#[derive(Debug, Clone)]
pub struct InvoicingConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

/// Where entities are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local tables. Nothing survives a restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown storage backend '{}', expected 'postgres' or 'memory'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub token_ttl_minutes: i64,
}

impl InvoicingConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let storage: StorageBackend = env::var("INVOICING_STORAGE")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        // The in-memory backend has no use for a connection string.
        let database_url = match storage {
            StorageBackend::Postgres => get_env("INVOICING_DATABASE_URL", None, is_prod)?,
            StorageBackend::Memory => env::var("INVOICING_DATABASE_URL").unwrap_or_default(),
        };

        Ok(InvoicingConfig {
            common,
            service_name: "invoicing-service".to_string(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .ok()
                .filter(|v| !v.is_empty()),
            storage,
            database: DatabaseConfig {
                url: Secret::new(database_url),
                max_connections: parse_env("INVOICING_DB_MAX_CONNECTIONS", 10)?,
                min_connections: parse_env("INVOICING_DB_MIN_CONNECTIONS", 2)?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env(
                    "INVOICING_JWT_SECRET",
                    Some(DEV_JWT_SECRET),
                    is_prod,
                )?),
                token_ttl_minutes: parse_env("INVOICING_TOKEN_TTL_MINUTES", 60)?,
            },
        })
    }

    /// Configuration for an in-process server backed by memory storage.
    pub fn in_memory(jwt_secret: &str) -> Self {
        InvoicingConfig {
            common: core_config::Config::default(),
            service_name: "invoicing-service".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            storage: StorageBackend::Memory,
            database: DatabaseConfig {
                url: Secret::new(String::new()),
                max_connections: 1,
                min_connections: 0,
            },
            jwt: JwtConfig {
                secret: Secret::new(jwt_secret.to_string()),
                token_ttl_minutes: 60,
            },
        }
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val.parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has an invalid value '{}': {}", key, val, e))
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_backend_parses_case_insensitively() {
        assert_eq!(
            "Memory".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert_eq!(
            "postgres".parse::<StorageBackend>().unwrap(),
            StorageBackend::Postgres
        );
        assert!("mongo".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn in_memory_config_uses_memory_storage() {
        let config = InvoicingConfig::in_memory("secret");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.jwt.token_ttl_minutes, 60);
    }
}
