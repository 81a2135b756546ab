//! Error types for the identity service

use thiserror::Error;

use crate::clients::{AuthServiceError, NotificationError};
use crate::validation::ValidationFailures;

#[derive(Debug, Error)]
pub enum Error {
    /// One or more request fields failed validation. Carries the full
    /// field-to-message map accumulated by the validator.
    #[error("one or more fields failed validation")]
    Validation(ValidationFailures),

    #[error("a user with this email address already exists")]
    DuplicateEmail,

    #[error("record not found")]
    RecordNotFound,

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("{0}")]
    Unauthenticated(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database operation timed out")]
    DatabaseTimeout,

    #[error("authentication service error: {0}")]
    AuthService(#[from] AuthServiceError),

    #[error("notification service error: {0}")]
    Notification(#[from] NotificationError),

    #[error("{0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a single-field validation failure, used when a
    /// storage or remote-service outcome is reported against one field
    /// (duplicate email, invalid activation token).
    pub fn field_failure(field: &'static str, message: &str) -> Self {
        Error::Validation(ValidationFailures::single(field, message))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
