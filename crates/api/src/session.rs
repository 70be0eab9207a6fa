//! Session identity resolution.
//!
//! Handlers never look at cookies directly: the session middleware asks a
//! [`SessionResolver`] for the caller's user id once per request, and login,
//! logout and stale-identity responses ask it for the headers that set or
//! clear the session.

use axum::http::{HeaderMap, HeaderValue, header::SET_COOKIE};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use pollbox_common::config::SessionConfig;

/// Resolves and issues session identities.
pub trait SessionResolver: Send + Sync {
    /// User id carried by the request, if any.
    fn resolve(&self, headers: &HeaderMap) -> Option<i32>;

    /// Response headers that start a session for `user_id`.
    fn establish(&self, user_id: i32) -> HeaderMap;

    /// Response headers that end the current session.
    fn revoke(&self) -> HeaderMap;
}

/// Session carried in a cookie holding the user id.
#[derive(Debug, Clone)]
pub struct CookieSessionResolver {
    cookie_name: String,
    max_age: time::Duration,
    secure: bool,
}

impl CookieSessionResolver {
    /// Create a resolver from configuration.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            max_age: time::Duration::hours(config.max_age_hours),
            secure: config.secure,
        }
    }

    fn cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build()
    }
}

impl SessionResolver for CookieSessionResolver {
    fn resolve(&self, headers: &HeaderMap) -> Option<i32> {
        CookieJar::from_headers(headers)
            .get(&self.cookie_name)
            .and_then(|cookie| cookie.value().parse().ok())
    }

    fn establish(&self, user_id: i32) -> HeaderMap {
        let mut cookie = self.cookie(user_id.to_string());
        cookie.set_max_age(self.max_age);
        set_cookie_headers(&cookie)
    }

    fn revoke(&self) -> HeaderMap {
        let mut cookie = self.cookie(String::new());
        cookie.make_removal();
        set_cookie_headers(&cookie)
    }
}

fn set_cookie_headers(cookie: &Cookie<'_>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.insert(SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(error = %e, "Session cookie is not a valid header value"),
    }
    headers
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn resolver() -> CookieSessionResolver {
        CookieSessionResolver::new(&SessionConfig::default())
    }

    fn request_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_resolve_reads_user_id() {
        let headers = request_with_cookie("theme=dark; user_id=42");
        assert_eq!(resolver().resolve(&headers), Some(42));
    }

    #[test]
    fn test_resolve_ignores_garbage() {
        assert_eq!(resolver().resolve(&request_with_cookie("user_id=abc")), None);
        assert_eq!(resolver().resolve(&HeaderMap::new()), None);
    }

    #[test]
    fn test_establish_sets_http_only_cookie() {
        let headers = resolver().establish(7);
        let value = headers.get(SET_COOKIE).unwrap().to_str().unwrap();

        assert!(value.starts_with("user_id=7"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("Max-Age=86400"));
    }

    #[test]
    fn test_revoke_expires_cookie() {
        let headers = resolver().revoke();
        let value = headers.get(SET_COOKIE).unwrap().to_str().unwrap();

        assert!(value.starts_with("user_id="));
        assert!(value.contains("Max-Age=0"));
    }
}
