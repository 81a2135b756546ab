//! Clients for the sibling authentication and notification services
//!
//! Credential storage, token issuance/validation and permission grants all
//! live in the authentication service; activation emails are sent by the
//! notification service. The orchestrator and the request gate consume both
//! through these traits, so tests substitute in-memory fakes.

mod http;

pub use http::{HttpAuthenticationClient, HttpNotificationClient};

use async_trait::async_trait;
use thiserror::Error;

use crate::types::TokenScope;

#[derive(Debug, Error)]
pub enum AuthServiceError {
    /// The token does not exist, has the wrong scope, or has expired.
    #[error("token not found")]
    TokenNotFound,

    #[error("authentication service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Remote authentication service operations used by this service
#[async_trait]
pub trait AuthenticationApi: Send + Sync {
    /// Resolve a token of the given scope to the owning user id.
    async fn authenticate(
        &self,
        scope: TokenScope,
        token_plaintext: &str,
    ) -> Result<i64, AuthServiceError>;

    /// Store the initial password for a newly registered user.
    async fn set_password(&self, user_id: i64, password: &str) -> Result<(), AuthServiceError>;

    /// Grant permission codes to a user.
    async fn add_permission_for_user(
        &self,
        user_id: i64,
        codes: &[&str],
    ) -> Result<(), AuthServiceError>;

    /// Mint a token of the given scope for a user, returning its plaintext.
    async fn create_token(&self, scope: TokenScope, user_id: i64)
        -> Result<String, AuthServiceError>;

    /// Revoke every token a user holds in the given scope.
    async fn delete_all_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<(), AuthServiceError>;
}

/// Remote notification service operations used by this service
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Deliver the activation email carrying the token plaintext.
    async fn send_activation_email(
        &self,
        recipient: &str,
        user_id: i64,
        token: &str,
    ) -> Result<(), NotificationError>;
}
