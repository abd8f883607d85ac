//! Configuration management for the Recyclable Materials Marketplace
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with RMX_ prefix

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

    /// Administrator registration configuration
    pub admin: AdminConfig,

    /// Payment gateway configuration
    pub payments: PaymentsConfig,

    /// Object storage configuration
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,

    /// Public base URL of this deployment (payment redirects)
    pub public_url: String,
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
pub struct AdminConfig {
    /// Out-of-band code required to register administrator accounts
    pub secret_code: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// Gateway merchant ID
    pub merchant_id: String,

    /// Gateway private (server-side) API key
    pub private_key: String,

    /// Gateway public (client-side) key, echoed to clients at checkout
    pub public_key: String,

    /// Gateway API base URL
    pub base_url: String,

    /// Sandbox mode: charges are simulated and settled via a signed
    /// loopback webhook instead of real gateway calls
    pub sandbox: bool,

    /// Shared secret for webhook signature verification
    pub webhook_secret: String,

    /// URL the sandbox loopback webhook posts to
    pub webhook_url: String,

    /// Minutes after which a PENDING purchase is eligible for reconciliation
    pub pending_timeout_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Object storage API base URL (e.g. https://<project>.supabase.co/storage/v1)
    pub base_url: String,

    /// Bucket holding listing images and avatars
    pub bucket: String,

    /// Service key for authenticated storage operations
    pub service_key: String,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("RMX_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.public_url", "http://localhost:3000")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("payments.base_url", "https://sandbox-api.openpay.mx/v1")?
            .set_default("payments.sandbox", true)?
            .set_default(
                "payments.webhook_url",
                "http://127.0.0.1:3000/api/v1/webhook/payments",
            )?
            .set_default("payments.pending_timeout_minutes", 30)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (RMX_ prefix)
            .add_source(
                Environment::with_prefix("RMX")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
            public_url: "http://localhost:3000".to_string(),
        }
    }
}
