//! Account lifecycle orchestration
//!
//! One method per remote procedure. Registration fans out across the user
//! store, the authentication service and the notification service with no
//! compensating rollback: when a later step fails, the unactivated user row
//! stays behind and the caller sees an internal error. Registering the same
//! email again then reports it as taken.

use std::sync::Arc;

use tracing::error;

use crate::clients::{AuthServiceError, AuthenticationApi, NotificationApi};
use crate::error::{Error, Result};
use crate::types::{NewUser, TokenScope, User};
use crate::user_store::UserStore;
use crate::validation::{self, Validator};

/// Permission granted to every new account.
const DEFAULT_PERMISSION: &str = "users:read";

/// Orchestrates the account lifecycle across the user store and the two
/// remote services.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    auth: Arc<dyn AuthenticationApi>,
    notifier: Arc<dyn NotificationApi>,
}

impl UserService {
    pub fn new(
        store: Arc<dyn UserStore>,
        auth: Arc<dyn AuthenticationApi>,
        notifier: Arc<dyn NotificationApi>,
    ) -> Self {
        Self {
            store,
            auth,
            notifier,
        }
    }

    /// Register a new account: insert the user row, store the password and
    /// initial permission with the authentication service, then send the
    /// activation email.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let mut v = Validator::new();
        validation::validate_password_plaintext(&mut v, password);
        validation::validate_user(&mut v, name, email);
        v.finish()?;

        let new_user = NewUser {
            name: name.to_string(),
            email: email.to_string(),
        };

        let user = match self.store.insert(new_user).await {
            Ok(user) => user,
            Err(Error::DuplicateEmail) => {
                return Err(Error::field_failure(
                    "email",
                    "a user with this email address already exists",
                ));
            }
            Err(err) => return Err(err),
        };

        if let Err(err) = self.auth.set_password(user.id, password).await {
            error!("failed to set initial password for user {}: {}", user.id, err);
            return Err(Error::Internal("failed to set initial password".to_string()));
        }

        self.auth
            .add_permission_for_user(user.id, &[DEFAULT_PERMISSION])
            .await?;

        let token = self.auth.create_token(TokenScope::Activation, user.id).await?;

        if let Err(err) = self
            .notifier
            .send_activation_email(&user.email, user.id, &token)
            .await
        {
            error!("failed to send activation email to {}: {}", user.email, err);
            return Err(err.into());
        }

        Ok(user)
    }

    /// Activate the account the token was issued for, then revoke every
    /// outstanding activation token for it.
    pub async fn activate(&self, token_plaintext: &str) -> Result<User> {
        let mut v = Validator::new();
        validation::validate_token_plaintext(&mut v, token_plaintext);
        v.finish()?;

        let user_id = match self
            .auth
            .authenticate(TokenScope::Activation, token_plaintext)
            .await
        {
            Ok(user_id) => user_id,
            Err(AuthServiceError::TokenNotFound) => {
                return Err(Error::field_failure(
                    "token",
                    "invalid or expired activation token",
                ));
            }
            Err(err) => return Err(err.into()),
        };

        let mut user = match self.store.get_by_id(user_id).await {
            Ok(user) => user,
            // A token pointing at a row that no longer exists is reported
            // the same way as a bad token.
            Err(Error::RecordNotFound) => {
                return Err(Error::field_failure(
                    "token",
                    "invalid or expired activation token",
                ));
            }
            Err(err) => return Err(err),
        };

        user.activated = true;
        self.store.update(&mut user).await?;

        self.auth
            .delete_all_tokens_for_user(TokenScope::Activation, user.id)
            .await?;

        Ok(user)
    }

    /// Issue an authentication token for the account with this email.
    pub async fn login(&self, email: &str, _password: &str) -> Result<String> {
        let user = match self.store.get_by_email(email).await {
            Ok(user) => user,
            Err(err) => {
                error!("login lookup for {} failed: {}", email, err);
                return Err(err);
            }
        };

        // TODO: verify the password against the authentication service
        // before minting a session token.
        let token = self
            .auth
            .create_token(TokenScope::Authentication, user.id)
            .await?;

        Ok(token)
    }

    /// Fetch the account details of an authenticated user.
    pub async fn get_details(&self, user_id: i64) -> Result<User> {
        match self.store.get_by_id(user_id).await {
            Ok(user) => Ok(user),
            // The gate vouched for this id, so a missing row is an internal
            // inconsistency rather than a caller mistake.
            Err(Error::RecordNotFound) => Err(Error::Internal("user not found".to_string())),
            Err(err) => Err(err),
        }
    }

    /// Revoke every authentication token the user holds.
    pub async fn logout(&self, user_id: i64) -> Result<()> {
        if let Err(err) = self
            .auth
            .delete_all_tokens_for_user(TokenScope::Authentication, user_id)
            .await
        {
            error!("failed to revoke tokens for user {}: {}", user_id, err);
            return Err(err.into());
        }

        Ok(())
    }

    /// Authenticate a bearer token carried by a gated request.
    pub async fn authenticate_token(&self, token_plaintext: &str) -> Result<i64> {
        self.auth
            .authenticate(TokenScope::Authentication, token_plaintext)
            .await
            .map_err(|err| Error::Unauthenticated(err.to_string()))
    }
}
