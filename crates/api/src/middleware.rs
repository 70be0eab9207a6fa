//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use pollbox_core::{PollService, ResultsService, UserService, VoteService};

use crate::{extractors::SessionUser, session::SessionResolver};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub poll_service: PollService,
    pub vote_service: VoteService,
    pub results_service: ResultsService,
    pub sessions: Arc<dyn SessionResolver>,
}

/// Session middleware.
///
/// Resolves the caller's user id and stores it as a [`SessionUser`]
/// request extension for [`AuthUser`](crate::extractors::AuthUser).
pub async fn session_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(user_id) = state.sessions.resolve(req.headers()) {
        req.extensions_mut().insert(SessionUser(user_id));
    }

    next.run(req).await
}
