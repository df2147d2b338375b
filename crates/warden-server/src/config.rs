//! Configuration management

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/pg_warden";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default CORS allowed origin for the operator console.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:4200";

// ============================================================================
// Gateway Configuration Constants
// ============================================================================

/// Default downstream statement timeout in milliseconds.
pub const DEFAULT_STATEMENT_TIMEOUT_MS: u64 = 5000;

/// Caller recorded when a request carries no identity.
pub const DEFAULT_WARDEN_USER: &str = "warden_app";

/// Tables the registry knows about at startup.
pub const DEFAULT_KNOWN_TABLES: &[&str] = &["products", "customer_payments"];

/// Audit records reloaded from PostgreSQL at startup.
pub const DEFAULT_AUDIT_HISTORY_LIMIT: i64 = 1000;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub warden: WardenConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration, used when the store is `postgres`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    /// `0` in the environment disables the idle timeout.
    pub idle_timeout_secs: Option<u64>,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Backing store for data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Postgres,
}

/// How the demo endpoints reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessPath {
    /// Typed operations (`jpa` in the original backend naming).
    Structured,
    /// Hand-built statement text (`jdbc`).
    Direct,
}

/// Whether the gateway intercepts at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    Warden,
    Vanilla,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Postgres => "postgres",
        }
    }
}

impl AccessPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessPath::Structured => "structured",
            AccessPath::Direct => "direct",
        }
    }
}

impl Enforcement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Enforcement::Warden => "warden",
            Enforcement::Vanilla => "vanilla",
        }
    }

    pub fn intercepts(&self) -> bool {
        matches!(self, Enforcement::Warden)
    }
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(StoreKind::Memory),
            "postgres" | "postgresql" | "pg" => Ok(StoreKind::Postgres),
            other => anyhow::bail!("Unknown store '{}', expected memory or postgres", other),
        }
    }
}

impl FromStr for AccessPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "structured" | "jpa" => Ok(AccessPath::Structured),
            "direct" | "jdbc" => Ok(AccessPath::Direct),
            other => anyhow::bail!("Unknown access path '{}', expected structured or direct", other),
        }
    }
}

impl FromStr for Enforcement {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "warden" | "protected" => Ok(Enforcement::Warden),
            "vanilla" | "off" => Ok(Enforcement::Vanilla),
            other => anyhow::bail!("Unknown enforcement '{}', expected warden or vanilla", other),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    pub store: StoreKind,
    pub access_path: AccessPath,
    pub enforcement: Enforcement,
    pub default_user: String,
    pub known_tables: Vec<String>,
    pub protected_tables: Vec<String>,
    pub statement_timeout_ms: u64,
    /// Maximum audit records kept in memory; `None` keeps everything.
    pub audit_retention: Option<usize>,
}

impl WardenConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Like [`env_parse`] but an unparseable value is an error instead of the
/// default; a typo in an enum setting should not silently pick a mode.
fn env_enum<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .parse()
            .map_err(|e: anyhow::Error| e.context(format!("invalid {}", key))),
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: std::env::var("WARDEN_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_parse("WARDEN_PORT").unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_parse("WARDEN_SHUTDOWN_TIMEOUT")
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_parse("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                min_connections: env_parse("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or(DEFAULT_DATABASE_MIN_CONNECTIONS),
                connect_timeout_secs: env_parse("DATABASE_CONNECT_TIMEOUT")
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
                idle_timeout_secs: match env_parse::<u64>("DATABASE_IDLE_TIMEOUT") {
                    Some(0) => None,
                    Some(secs) => Some(secs),
                    None => Some(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
                },
            },
            cors: CorsConfig {
                allowed_origins: env_list("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|| vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()]),
                allow_credentials: env_parse("CORS_ALLOW_CREDENTIALS").unwrap_or(true),
            },
            warden: WardenConfig {
                store: env_enum("WARDEN_STORE", StoreKind::Memory)?,
                access_path: env_enum("WARDEN_ACCESS_PATH", AccessPath::Structured)?,
                enforcement: env_enum("WARDEN_ENFORCEMENT", Enforcement::Warden)?,
                default_user: std::env::var("WARDEN_USER")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_WARDEN_USER.to_string()),
                known_tables: env_list("WARDEN_KNOWN_TABLES").unwrap_or_else(|| {
                    DEFAULT_KNOWN_TABLES.iter().map(|s| s.to_string()).collect()
                }),
                protected_tables: env_list("WARDEN_PROTECTED_TABLES").unwrap_or_default(),
                statement_timeout_ms: env_parse("WARDEN_STATEMENT_TIMEOUT_MS")
                    .unwrap_or(DEFAULT_STATEMENT_TIMEOUT_MS),
                audit_retention: env_parse::<usize>("WARDEN_AUDIT_RETENTION")
                    .filter(|&n| n > 0),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        // Validate port
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.warden.store == StoreKind::Postgres {
            // Validate database URL
            if self.database.url.is_empty() {
                anyhow::bail!("Database URL cannot be empty");
            }

            // Validate connection pool settings
            if self.database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }

            if self.database.min_connections > self.database.max_connections {
                anyhow::bail!(
                    "Database min_connections ({}) cannot be greater than max_connections ({})",
                    self.database.min_connections,
                    self.database.max_connections
                );
            }
        }

        if self.warden.statement_timeout_ms == 0 {
            anyhow::bail!("Statement timeout must be greater than 0");
        }

        for table in self.warden.known_tables.iter().chain(&self.warden.protected_tables) {
            if !crate::sql::is_valid_identifier(&table.to_lowercase()) {
                anyhow::bail!("Invalid table name in configuration: '{}'", table);
            }
        }

        // Validate CORS origins
        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            store: StoreKind::Memory,
            access_path: AccessPath::Structured,
            enforcement: Enforcement::Warden,
            default_user: DEFAULT_WARDEN_USER.to_string(),
            known_tables: DEFAULT_KNOWN_TABLES.iter().map(|s| s.to_string()).collect(),
            protected_tables: Vec::new(),
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT_MS,
            audit_retention: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: Some(DEFAULT_DATABASE_IDLE_TIMEOUT_SECS),
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            warden: WardenConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "WARDEN_PORT",
        "WARDEN_STORE",
        "WARDEN_ACCESS_PATH",
        "WARDEN_ENFORCEMENT",
        "WARDEN_USER",
        "WARDEN_PROTECTED_TABLES",
        "WARDEN_KNOWN_TABLES",
        "WARDEN_STATEMENT_TIMEOUT_MS",
        "WARDEN_AUDIT_RETENTION",
        "DATABASE_IDLE_TIMEOUT",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.warden.enforcement, Enforcement::Warden);
        assert_eq!(config.warden.statement_timeout(), Duration::from_millis(5000));
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_mode_aliases() {
        assert_eq!("JPA".parse::<AccessPath>().unwrap(), AccessPath::Structured);
        assert_eq!("jdbc".parse::<AccessPath>().unwrap(), AccessPath::Direct);
        assert_eq!("Vanilla".parse::<Enforcement>().unwrap(), Enforcement::Vanilla);
        assert_eq!("postgresql".parse::<StoreKind>().unwrap(), StoreKind::Postgres);
        assert!("mongo".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.warden.statement_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.warden.protected_tables = vec!["products; drop".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.warden.store = StoreKind::Postgres;
        config.database.min_connections = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_settings_ignored_for_memory_store() {
        let mut config = Config::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_from_env() {
        clear_env();
        std::env::set_var("WARDEN_PORT", "9090");
        std::env::set_var("WARDEN_ACCESS_PATH", "jdbc");
        std::env::set_var("WARDEN_PROTECTED_TABLES", "products, customer_payments");
        std::env::set_var("WARDEN_AUDIT_RETENTION", "250");
        std::env::set_var("DATABASE_IDLE_TIMEOUT", "0");

        let config = Config::load().unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.warden.access_path, AccessPath::Direct);
        assert_eq!(config.warden.protected_tables, vec!["products", "customer_payments"]);
        assert_eq!(config.warden.audit_retention, Some(250));
        assert_eq!(config.database.idle_timeout_secs, None);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_rejects_unknown_enforcement() {
        clear_env();
        std::env::set_var("WARDEN_ENFORCEMENT", "sometimes");
        assert!(Config::load().is_err());
        clear_env();
    }
}
