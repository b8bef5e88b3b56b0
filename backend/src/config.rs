//! Configuration management for the Dance Studio Management Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with STUDIO__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Subdomain tenancy configuration
    pub tenancy: TenancyConfig,

    /// Payment provider configuration
    pub billing: BillingConfig,

    /// Notification edge function configuration
    pub notifications: NotificationConfig,

    /// Cron endpoint configuration
    pub cron: CronConfig,

    /// In-process scheduler configuration
    pub scheduler: SchedulerConfig,

    /// Log output configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TenancyConfig {
    /// Domain under which studios get subdomains, e.g. "studiohub.app"
    pub root_domain: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    /// Payment provider REST base URL
    pub api_base_url: String,

    /// Payment provider secret API key
    pub secret_key: String,

    /// Shared secret for webhook signatures
    pub webhook_secret: String,

    /// Maximum accepted age of a signed webhook, in seconds
    pub signature_tolerance_secs: i64,

    /// Default invoice currency
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Notification edge function URL
    pub endpoint_url: String,

    /// Bearer key for the edge function
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CronConfig {
    /// Bearer secret expected on cron endpoints
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Run delivery and billing jobs inside the server process
    pub enabled: bool,

    /// Seconds between job runs
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// "pretty" or "json"
    pub format: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STUDIO_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("tenancy.root_domain", "localhost")?
            .set_default("billing.api_base_url", "https://api.stripe.com/v1")?
            .set_default("billing.secret_key", "")?
            .set_default("billing.signature_tolerance_secs", 300)?
            .set_default("billing.currency", "usd")?
            .set_default("notifications.api_key", "")?
            .set_default("notifications.timeout_secs", 10)?
            .set_default("scheduler.enabled", false)?
            .set_default("scheduler.interval_secs", 60)?
            .set_default("logging.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STUDIO__ prefix)
            .add_source(
                Environment::with_prefix("STUDIO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
