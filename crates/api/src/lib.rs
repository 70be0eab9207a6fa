//! HTTP API layer for pollbox.
//!
//! - **Endpoints**: signup/login, users, polls, votes and results
//! - **Session**: identity resolution behind the [`SessionResolver`] trait
//! - **Extractors**: authenticated user, JSON bodies and path ids that
//!   reject with [`AppError`](pollbox_common::AppError)
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod session;

pub use endpoints::router;
pub use middleware::{AppState, session_middleware};
pub use session::{CookieSessionResolver, SessionResolver};
