//! HTTP implementations of the remote-service clients
//!
//! Both sibling services expose the same JSON-over-HTTP convention as this
//! one: procedures are POSTed to `/rpc/v1/<Procedure>`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AuthServiceError, AuthenticationApi, NotificationApi, NotificationError};
use crate::types::TokenScope;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationRequest<'a> {
    token_scope: TokenScope,
    token_plaintext: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticationResponse {
    user_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SetPasswordRequest<'a> {
    user_id: i64,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddPermissionForUserRequest<'a> {
    user_id: i64,
    codes: &'a [&'a str],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenCreationRequest {
    scope: TokenScope,
    user_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenCreationResponse {
    token_plaintext: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokensDeletionRequest {
    scope: TokenScope,
    user_id: i64,
}

// The notification service takes the user id as a string.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendActivationEmailRequest<'a> {
    recipient: &'a str,
    user_id: String,
    token: &'a str,
}

/// Client for the authentication service
#[derive(Debug, Clone)]
pub struct HttpAuthenticationClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthenticationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthServiceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call<Req: Serialize>(
        &self,
        procedure: &str,
        body: &Req,
    ) -> Result<reqwest::Response, AuthServiceError> {
        let url = format!("{}/rpc/v1/{}", self.base_url, procedure);
        let response = self.http.post(url).json(body).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response.text().await.unwrap_or_default();
        Err(AuthServiceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AuthenticationApi for HttpAuthenticationClient {
    async fn authenticate(
        &self,
        scope: TokenScope,
        token_plaintext: &str,
    ) -> Result<i64, AuthServiceError> {
        let request = AuthenticationRequest {
            token_scope: scope,
            token_plaintext,
        };

        match self.call("Authenticate", &request).await {
            Ok(response) => {
                let body: AuthenticationResponse = response.json().await?;
                Ok(body.user_id)
            }
            Err(AuthServiceError::Status { status: 404, .. }) => {
                Err(AuthServiceError::TokenNotFound)
            }
            Err(err) => Err(err),
        }
    }

    async fn set_password(&self, user_id: i64, password: &str) -> Result<(), AuthServiceError> {
        let request = SetPasswordRequest { user_id, password };
        self.call("SetPassword", &request).await?;
        Ok(())
    }

    async fn add_permission_for_user(
        &self,
        user_id: i64,
        codes: &[&str],
    ) -> Result<(), AuthServiceError> {
        let request = AddPermissionForUserRequest { user_id, codes };
        self.call("AddPermissionForUser", &request).await?;
        Ok(())
    }

    async fn create_token(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<String, AuthServiceError> {
        let request = TokenCreationRequest { scope, user_id };
        let response = self.call("CreateToken", &request).await?;
        let body: TokenCreationResponse = response.json().await?;
        Ok(body.token_plaintext)
    }

    async fn delete_all_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<(), AuthServiceError> {
        let request = TokensDeletionRequest { scope, user_id };
        self.call("DeleteAllTokensForUser", &request).await?;
        Ok(())
    }
}

/// Client for the notification service
#[derive(Debug, Clone)]
pub struct HttpNotificationClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpNotificationClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, NotificationError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationClient {
    async fn send_activation_email(
        &self,
        recipient: &str,
        user_id: i64,
        token: &str,
    ) -> Result<(), NotificationError> {
        let request = SendActivationEmailRequest {
            recipient,
            user_id: user_id.to_string(),
            token,
        };

        let url = format!("{}/rpc/v1/SendActivationEmail", self.base_url);
        let response = self.http.post(url).json(&request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(NotificationError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
