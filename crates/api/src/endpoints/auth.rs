//! Authentication endpoints.

use axum::{
    Router,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use pollbox_common::AppResult;
use pollbox_core::CredentialsInput;
use serde::Serialize;

use crate::{
    extractors::ApiJson,
    middleware::AppState,
    response::{ApiResponse, MessageResponse},
};

/// Signup response.
#[derive(Serialize)]
pub struct SignupResponse {
    pub user_id: i32,
    pub username: String,
}

/// Create a new user account.
async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CredentialsInput>,
) -> AppResult<ApiResponse<SignupResponse>> {
    let user = state.user_service.signup(req).await?;

    Ok(ApiResponse::created(SignupResponse {
        user_id: user.id,
        username: user.username,
    }))
}

/// Log in and start a session.
async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CredentialsInput>,
) -> AppResult<(HeaderMap, ApiResponse<MessageResponse>)> {
    let user = state.user_service.login(req).await?;
    tracing::debug!(user_id = user.id, "User logged in");

    Ok((
        state.sessions.establish(user.id),
        ApiResponse::ok(MessageResponse {
            message: "login successful",
        }),
    ))
}

/// End the current session.
async fn logout(State(state): State<AppState>) -> (HeaderMap, ApiResponse<MessageResponse>) {
    (
        state.sessions.revoke(),
        ApiResponse::ok(MessageResponse {
            message: "logout successful",
        }),
    )
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
}
