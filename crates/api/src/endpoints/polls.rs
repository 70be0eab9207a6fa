//! Poll endpoints.

use axum::{
    Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use pollbox_common::{AppError, AppResult};
use pollbox_core::{
    CreatePollInput, OptionVoters, PollDetail, PollResults, PollView, UpdatePollInput,
};
use serde::Deserialize;

use crate::{
    extractors::{ApiJson, ApiPath, AuthUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Vote request.
#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub option_id: i32,
}

/// Render an error, clearing the session when it names a user that no
/// longer exists.
fn reject(state: &AppState, err: AppError) -> Response {
    match err {
        AppError::Unauthorized => (state.sessions.revoke(), err).into_response(),
        other => other.into_response(),
    }
}

/// Create a poll owned by the caller.
async fn create_poll(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(req): ApiJson<CreatePollInput>,
) -> Result<ApiResponse<PollView>, Response> {
    let poll = state
        .poll_service
        .create(user_id, req)
        .await
        .map_err(|e| reject(&state, e))?;

    Ok(ApiResponse::created(poll))
}

/// List all polls with their options.
async fn list_polls(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<PollView>>> {
    let polls = state.poll_service.list().await?;
    Ok(ApiResponse::ok(polls))
}

/// Get a poll with live vote counts.
async fn get_poll(
    State(state): State<AppState>,
    ApiPath(poll_id): ApiPath<i32>,
) -> AppResult<ApiResponse<PollDetail>> {
    let poll = state.poll_service.get(poll_id).await?;
    Ok(ApiResponse::ok(poll))
}

/// Replace a poll's options. Existing votes are discarded.
async fn update_poll(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(poll_id): ApiPath<i32>,
    ApiJson(req): ApiJson<UpdatePollInput>,
) -> Result<ApiResponse<PollView>, Response> {
    let poll = state
        .poll_service
        .update_options(poll_id, user_id, req)
        .await
        .map_err(|e| reject(&state, e))?;

    Ok(ApiResponse::ok(poll))
}

/// Delete a poll with its options and votes.
async fn delete_poll(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(poll_id): ApiPath<i32>,
) -> Result<impl IntoResponse, Response> {
    state
        .poll_service
        .delete(poll_id, user_id)
        .await
        .map_err(|e| reject(&state, e))?;

    Ok(no_content())
}

/// Cast the caller's vote and return the results it was counted in.
async fn vote(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(poll_id): ApiPath<i32>,
    ApiJson(req): ApiJson<VoteRequest>,
) -> Result<ApiResponse<PollResults>, Response> {
    let results = state
        .vote_service
        .cast_with_results(user_id, poll_id, req.option_id)
        .await
        .map_err(|e| reject(&state, e))?;

    Ok(ApiResponse::created(results))
}

/// Vote counts per option.
async fn results(
    State(state): State<AppState>,
    ApiPath(poll_id): ApiPath<i32>,
) -> AppResult<ApiResponse<PollResults>> {
    let results = state.results_service.results(poll_id).await?;
    Ok(ApiResponse::ok(results))
}

/// Users who voted for one option of the poll.
async fn voters(
    State(state): State<AppState>,
    ApiPath((poll_id, option_id)): ApiPath<(i32, i32)>,
) -> AppResult<ApiResponse<OptionVoters>> {
    let voters = state
        .results_service
        .voters_in_poll(poll_id, option_id)
        .await?;
    Ok(ApiResponse::ok(voters))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/polls", get(list_polls).post(create_poll))
        .route(
            "/polls/{id}",
            get(get_poll).put(update_poll).delete(delete_poll),
        )
        .route("/polls/{id}/vote", post(vote))
        .route("/polls/{id}/results", get(results))
        .route("/polls/{id}/results/{option_id}/voters", get(voters))
}
