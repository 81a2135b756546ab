//! # Identity-Core
//!
//! User identity service: the system of record for user accounts.
//!
//! This crate provides:
//! - User storage in SQLite with optimistic concurrency control
//! - Registration, activation, login and logout orchestration
//! - A bearer-token gate in front of protected procedures
//! - A JSON-over-HTTP RPC surface
//!
//! ## Architecture
//!
//! Identity-core owns the `users` record and nothing else. Passwords,
//! tokens and permissions belong to the remote authentication service;
//! activation emails are delivered by the remote notification service.
//! Account registration and activation orchestrate calls across all three.

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod service;
pub mod types;
pub mod user_store;
pub mod validation;

pub use clients::{
    AuthServiceError, AuthenticationApi, HttpAuthenticationClient, HttpNotificationClient,
    NotificationApi, NotificationError,
};
pub use crate::config::ServiceConfig;
pub use error::{Error, Result};
pub use service::UserService;
pub use types::{AuthenticatedUser, NewUser, TokenScope, User};
pub use user_store::{SqliteUserStore, UserStore};

use std::sync::Arc;
use std::time::Duration;

/// Initialize the identity service: open the user store and connect the
/// remote-service clients.
pub async fn init(config: &ServiceConfig) -> Result<UserService> {
    let store =
        SqliteUserStore::with_max_connections(&config.database_url, config.db_max_connections)
            .await?;

    let remote_timeout = Duration::from_secs(config.remote_timeout_seconds);
    let auth = HttpAuthenticationClient::new(&config.authentication_service_url, remote_timeout)?;
    let notifier = HttpNotificationClient::new(&config.notification_service_url, remote_timeout)?;

    Ok(UserService::new(
        Arc::new(store),
        Arc::new(auth),
        Arc::new(notifier),
    ))
}
