//! Per-call authentication gate
//!
//! Runs once for every inbound request. Calls to protected procedures must
//! carry a bearer token the authentication service accepts; the resolved
//! user id is attached to the request for the handler. The handler itself
//! never sees an unauthenticated call.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use super::{ApiError, ApiState};
use crate::types::AuthenticatedUser;

/// Procedures that require an authenticated caller.
const PROTECTED_PROCEDURES: &[&str] = &["GetUser", "Logout"];

pub(crate) async fn authenticate(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_protected(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = match bearer_token(&request) {
        Some(token) => token,
        None => {
            warn!("missing bearer token for {}", request.uri().path());
            return Err(ApiError::unauthenticated("missing bearer token"));
        }
    };

    let user_id = match state.service.authenticate_token(token).await {
        Ok(user_id) => user_id,
        Err(err) => {
            warn!("rejected bearer token for {}: {}", request.uri().path(), err);
            return Err(err.into());
        }
    };

    request.extensions_mut().insert(AuthenticatedUser { user_id });

    Ok(next.run(request).await)
}

/// Whether the request path names a protected procedure.
fn is_protected(path: &str) -> bool {
    path.strip_prefix("/rpc/v1/")
        .map(|procedure| PROTECTED_PROCEDURES.contains(&procedure))
        .unwrap_or(false)
}

fn bearer_token(request: &Request) -> Option<&str> {
    let header = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}
