use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use brigade_common::{LoginReply, LoginRequest, PositionStore, UserProfile};
use tracing::{error, info, warn};

use super::error::AuthError;
use crate::service::AppState;

/// Check a username/secret pair against the store's active accounts.
///
/// Unknown, inactive and mismatching accounts all produce
/// [`AuthError::InvalidCredentials`].
pub async fn authenticate(
    store: &dyn PositionStore,
    request: &LoginRequest,
) -> Result<UserProfile, AuthError> {
    let username = request.username.trim();
    if username.is_empty() || request.secret.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }

    let user = store
        .find_active_user(username)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !secrets_match(&user.secret, &request.secret) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user.profile())
}

/// Compare every byte of `given` so timing does not leak the matching prefix.
fn secrets_match(expected: &str, given: &str) -> bool {
    let expected = expected.as_bytes();
    let given = given.as_bytes();
    let mut diff = expected.len() ^ given.len();
    for (i, byte) in given.iter().enumerate() {
        let other = expected.get(i).copied().unwrap_or(0);
        diff |= usize::from(byte ^ other);
    }
    diff == 0
}

/// `POST /api/login`
pub async fn login_handler(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            warn!("Malformed login request: {}", rejection.body_text());
            return AuthError::InvalidCredentials.into_response();
        }
    };

    match authenticate(state.store.as_ref(), &request).await {
        Ok(user) => {
            info!("User {} logged in", user.username);
            Json(LoginReply::success(user)).into_response()
        }
        Err(e) => {
            match &e {
                AuthError::InvalidCredentials => warn!("Failed login for '{}'", request.username),
                AuthError::Store(cause) => error!("Login lookup failed: {}", cause),
            }
            e.into_response()
        }
    }
}
