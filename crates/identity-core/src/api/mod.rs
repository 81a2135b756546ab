//! JSON-over-HTTP RPC surface
//!
//! Procedures are POSTed to `/rpc/v1/<Procedure>`. The gate middleware
//! authenticates callers of protected procedures before their handler runs;
//! everything else passes straight through.

pub mod gate;

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::Error;
use crate::service::UserService;
use crate::types::{AuthenticatedUser, User};

/// Shared state for the RPC handlers and the gate
#[derive(Clone)]
pub struct ApiState {
    pub service: UserService,
    pub environment: String,
}

/// Build the service router with tracing and the authentication gate.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/rpc/v1/RegisterUser", post(register_user))
        .route("/rpc/v1/ActivateUser", post(activate_user))
        .route("/rpc/v1/GetUser", post(get_user))
        .route("/rpc/v1/Login", post(login))
        .route("/rpc/v1/Logout", post(logout))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateUserRequest {
    pub token_plaintext: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetailsResponse {
    pub id: i64,
    pub email: String,
    pub name: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub activated: bool,
}

impl From<User> for UserDetailsResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: user.created_at.timestamp_millis(),
            activated: user.activated,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token_plaintext: String,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub environment: String,
}

async fn register_user(
    State(state): State<ApiState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<Json<UserDetailsResponse>, ApiError> {
    let user = state
        .service
        .register(&req.name, &req.email, &req.password)
        .await?;
    Ok(Json(user.into()))
}

async fn activate_user(
    State(state): State<ApiState>,
    Json(req): Json<ActivateUserRequest>,
) -> Result<Json<UserDetailsResponse>, ApiError> {
    let user = state.service.activate(&req.token_plaintext).await?;
    Ok(Json(user.into()))
}

async fn get_user(
    State(state): State<ApiState>,
    Extension(identity): Extension<AuthenticatedUser>,
) -> Result<Json<UserDetailsResponse>, ApiError> {
    let user = state.service.get_details(identity.user_id).await?;
    Ok(Json(user.into()))
}

async fn login(
    State(state): State<ApiState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token_plaintext = state.service.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse { token_plaintext }))
}

async fn logout(
    State(state): State<ApiState>,
    Extension(identity): Extension<AuthenticatedUser>,
) -> Result<Json<LogoutResponse>, ApiError> {
    state.service.logout(identity.user_id).await?;
    Ok(Json(LogoutResponse {}))
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "available",
        environment: state.environment,
    })
}

/// Wire-level error: HTTP status plus the error envelope body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    fields: Option<BTreeMap<&'static str, String>>,
}

impl ApiError {
    pub fn unauthenticated(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthenticated",
            message: message.to_string(),
            fields: None,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(failures) => Self {
                status: StatusCode::BAD_REQUEST,
                code: "invalid_argument",
                message: "one or more fields failed validation".to_string(),
                fields: Some(
                    failures
                        .iter()
                        .map(|(field, message)| (field, message.to_string()))
                        .collect(),
                ),
            },
            err @ (Error::DuplicateEmail | Error::EditConflict) => Self {
                status: StatusCode::BAD_REQUEST,
                code: "invalid_argument",
                message: err.to_string(),
                fields: None,
            },
            err @ Error::RecordNotFound => Self {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: err.to_string(),
                fields: None,
            },
            Error::Unauthenticated(message) => Self {
                status: StatusCode::UNAUTHORIZED,
                code: "unauthenticated",
                message,
                fields: None,
            },
            Error::Internal(message) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message,
                fields: None,
            },
            other => {
                error!("request failed: {}", other);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    message: "the server encountered a problem and could not process your request"
                        .to_string(),
                    fields: None,
                }
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a BTreeMap<&'static str, String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: self.code,
                message: &self.message,
                fields: self.fields.as_ref(),
            },
        };

        (self.status, Json(body)).into_response()
    }
}
