//! Bearer-token authentication.
//!
//! Two kinds of token are accepted. The admin token is generated on first
//! start and stored next to the data directory with owner-only permissions;
//! it may issue sessions and call chat endpoints as the default user. Session
//! tokens are short-lived and bound to one user id.

use std::path::Path;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use rand::Rng;

use crate::error::ApiError;
use crate::state::AppState;

/// Who a chat request is answered for. `None` means the default user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub Option<String>);

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Load the admin token from `token_path`, or generate and save a new one.
pub fn load_or_generate_token(token_path: &Path) -> std::io::Result<String> {
    if let Ok(contents) = std::fs::read_to_string(token_path) {
        let token = contents.trim().to_string();
        if !token.is_empty() {
            tracing::info!("API token loaded from {}", token_path.display());
            return Ok(token);
        }
    }

    let token = generate_token();
    if let Some(parent) = token_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(token_path, &token)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(token_path, std::fs::Permissions::from_mode(0o600))?;
    }
    tracing::info!("API token saved to {}", token_path.display());
    Ok(token)
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get("authorization")
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid Authorization header encoding".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Expected a bearer token".to_string()))
}

/// Middleware for admin-only endpoints.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let token = match bearer_token(req.headers()) {
        Ok(token) => token,
        Err(e) => return e.into_response(),
    };
    if token == state.api_token {
        return next.run(req).await;
    }
    if state.sessions.resolve(token).is_some() {
        return ApiError::Forbidden("Session tokens cannot manage sessions".to_string())
            .into_response();
    }
    ApiError::Unauthorized("Invalid bearer token".to_string()).into_response()
}

/// Middleware for chat endpoints. Attaches the [`CurrentUser`].
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let user = {
        let token = match bearer_token(req.headers()) {
            Ok(token) => token,
            Err(e) => return e.into_response(),
        };
        if token == state.api_token {
            CurrentUser(None)
        } else {
            match state.sessions.resolve(token) {
                Some(user_id) => CurrentUser(Some(user_id)),
                None => {
                    return ApiError::Unauthorized("Invalid or expired session token".to_string())
                        .into_response()
                }
            }
        }
    };
    req.extensions_mut().insert(user);
    next.run(req).await
}
