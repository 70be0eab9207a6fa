//! User endpoints.

use axum::{Router, extract::State, routing::get};
use pollbox_common::AppResult;
use pollbox_core::UserSummary;

use crate::{middleware::AppState, response::ApiResponse};

/// List registered users.
async fn list_users(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<UserSummary>>> {
    let users = state.user_service.list().await?;
    Ok(ApiResponse::ok(users))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/users", get(list_users))
}
