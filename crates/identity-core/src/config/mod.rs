//! Configuration for the identity service

use serde::Deserialize;

use crate::error::Error;

/// Main configuration
///
/// Every field can be overridden by an `IDENTITY__`-prefixed environment
/// variable (`IDENTITY__DATABASE_URL`, `IDENTITY__BIND_ADDRESS`, ...).
/// Single underscores inside field names are preserved.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the RPC listener binds to.
    pub bind_address: String,
    /// Deployment environment (development|staging|production).
    pub environment: String,
    /// SQLite database URL for the users store.
    pub database_url: String,
    /// Maximum connections held by the database pool.
    pub db_max_connections: u32,
    /// Base URL of the authentication service.
    pub authentication_service_url: String,
    /// Base URL of the notification service.
    pub notification_service_url: String,
    /// Request timeout applied to calls to both remote services.
    pub remote_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration, layering an optional file over the defaults and
    /// environment variables over both.
    pub fn load(config_file: Option<&str>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        builder = match config_file {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("identity").required(false)),
        };
        builder = builder.add_source(config::Environment::with_prefix("IDENTITY").separator("__"));

        let loaded = builder.build().map_err(|e| Error::Config(e.to_string()))?;
        loaded
            .try_deserialize()
            .map_err(|e| Error::Config(e.to_string()))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:40030".to_string(),
            environment: "development".to_string(),
            database_url: "sqlite://identity.db?mode=rwc".to_string(),
            db_max_connections: 25,
            authentication_service_url: "http://127.0.0.1:40020".to_string(),
            notification_service_url: "http://127.0.0.1:40010".to_string(),
            remote_timeout_seconds: 5,
        }
    }
}
