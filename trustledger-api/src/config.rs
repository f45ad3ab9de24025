/// Configuration management for the API server
///
/// Configuration is read from environment variables (a `.env` file is
/// loaded first when present).
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 8080)
/// - `STORE_BACKEND`: `postgres` or `memory` (default: postgres)
/// - `DATABASE_URL`: PostgreSQL connection string (required for postgres)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Session token signing key, at least 32 characters (required)
/// - `SESSION_TTL_HOURS`: Session lifetime (default: 24)
/// - `MEMBER_CODE_PREFIX`: Member code prefix (default: KT)
/// - `DEFAULT_ANNUAL_TAX`: Annual tax for new members (default: 20000.00)
/// - `ADMIN_USERNAME` / `ADMIN_PASSWORD`: Admin account created at startup
///   if missing (optional, both or neither)
/// - `CORS_ORIGINS`: Comma-separated allowed origins, `*` for any (default: *)
/// - `PRODUCTION`: Enables HSTS (default: false)
/// - `RUST_LOG` / `LOG_FORMAT`: Log filter and `json` output, read in main
///
/// # Example
///
/// ```no_run
/// use trustledger_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use anyhow::Context;
use rust_decimal::Decimal;
use trustledger_shared::ledger::identity::DEFAULT_CODE_PREFIX;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub session: SessionConfig,
    pub ledger: LedgerConfig,

    /// Admin account to bootstrap, if configured
    pub admin: Option<AdminConfig>,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (adds HSTS)
    pub production: bool,
}

/// Which record store to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// PostgreSQL connection URL (None for the memory backend)
    pub database_url: Option<String>,

    pub max_connections: u32,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Secret key for token signing
    ///
    /// Must be at least 32 characters. Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub ttl_hours: i64,
}

/// Ledger configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub member_code_prefix: String,
    pub default_annual_tax: Decimal,
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub username: String,
    pub password: String,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "API_PORT", 8080u16)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        let production = lookup("PRODUCTION").map(|v| parse_bool(&v)).unwrap_or(false);

        let backend = parse_or(&lookup, "STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = lookup("DATABASE_URL");
        if backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL environment variable is required");
        }
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let secret = lookup("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }
        let ttl_hours = parse_or(&lookup, "SESSION_TTL_HOURS", 24i64)?;
        if ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be positive");
        }

        let member_code_prefix = lookup("MEMBER_CODE_PREFIX")
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_CODE_PREFIX.to_string());
        if member_code_prefix.contains('-') {
            anyhow::bail!("MEMBER_CODE_PREFIX must not contain '-'");
        }
        let default_annual_tax = parse_or(&lookup, "DEFAULT_ANNUAL_TAX", Decimal::new(2000000, 2))?;
        if default_annual_tax < Decimal::ZERO {
            anyhow::bail!("DEFAULT_ANNUAL_TAX must not be negative");
        }

        let admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminConfig { username, password }),
            (None, None) => None,
            _ => anyhow::bail!("ADMIN_USERNAME and ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            store: StoreConfig {
                backend,
                database_url,
                max_connections,
            },
            session: SessionConfig { secret, ttl_hours },
            ledger: LedgerConfig {
                member_code_prefix,
                default_annual_tax,
            },
            admin,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgresql://localhost/trust"), ("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.max_connections, 10);
        assert_eq!(config.session.ttl_hours, 24);
        assert_eq!(config.ledger.member_code_prefix, "KT");
        assert_eq!(config.ledger.default_annual_tax.to_string(), "20000.00");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert!(!config.api.production);
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_memory_backend_needs_no_database() {
        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("CORS_ORIGINS", "https://trust.example.org, http://localhost:3000"),
            ("PRODUCTION", "true"),
            ("API_PORT", "9000"),
        ])
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.store.database_url.is_none());
        assert_eq!(config.api.cors_origins.len(), 2);
        assert!(config.api.production);
        assert_eq!(config.api.port, 9000);
    }

    #[test]
    fn test_missing_or_weak_secret() {
        assert!(load(&[("STORE_BACKEND", "memory")]).is_err());
        assert!(load(&[("STORE_BACKEND", "memory"), ("JWT_SECRET", "short")]).is_err());
    }

    #[test]
    fn test_postgres_requires_database_url() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(load(&[("STORE_BACKEND", "sqlite"), ("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("STORE_BACKEND", "memory"), ("JWT_SECRET", SECRET), ("API_PORT", "http")]).is_err());
        assert!(load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("DEFAULT_ANNUAL_TAX", "-5")
        ])
        .is_err());
    }

    #[test]
    fn test_admin_requires_both_fields() {
        assert!(load(&[("STORE_BACKEND", "memory"), ("JWT_SECRET", SECRET), ("ADMIN_USERNAME", "admin")]).is_err());

        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("ADMIN_USERNAME", "trustadmin"),
            ("ADMIN_PASSWORD", "admin-password"),
        ])
        .unwrap();
        assert_eq!(config.admin.unwrap().username, "trustadmin");
    }

    #[test]
    fn test_custom_prefix() {
        let config = load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("MEMBER_CODE_PREFIX", "KLT"),
        ])
        .unwrap();
        assert_eq!(config.ledger.member_code_prefix, "KLT");

        assert!(load(&[
            ("STORE_BACKEND", "memory"),
            ("JWT_SECRET", SECRET),
            ("MEMBER_CODE_PREFIX", "K-T")
        ])
        .is_err());
    }
}
