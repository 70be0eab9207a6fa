//! Request extractors.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use pollbox_common::AppError;

/// User id resolved from the session, inserted by the session middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser(pub i32);

/// Authenticated user extractor.
///
/// Only says a session names this id; whether the user still exists is
/// checked by the operation that needs it.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub i32);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .map(|session| Self(session.0))
            .ok_or(AppError::Unauthorized)
    }
}

/// JSON body extractor rejecting malformed input with [`AppError::BadRequest`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path extractor rejecting malformed ids with [`AppError::BadRequest`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
