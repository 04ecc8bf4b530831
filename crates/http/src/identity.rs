//! Bearer-token identity resolution and the sign-in redirect.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, header::LOCATION, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use libris_authz::UserDirectory;

use crate::error::LoginRequired;

/// Shared state for [`identity_middleware`].
#[derive(Debug, Clone)]
pub struct Identity {
    directory: Arc<UserDirectory>,
    login_url: Arc<str>,
}

impl Identity {
    pub fn new(directory: UserDirectory, login_url: impl Into<String>) -> Self {
        Self {
            directory: Arc::new(directory),
            login_url: Arc::from(login_url.into()),
        }
    }
}

/// Resolve the caller from `Authorization: Bearer <token>` and store it in the
/// request extensions. Responses flagged [`LoginRequired`] become a `302` to the
/// login URL carrying the original target in `next`.
pub async fn identity_middleware(
    State(identity): State<Identity>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);
    let caller = identity.directory.resolve(token);
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    if let Some(principal) = caller.principal() {
        tracing::debug!(username = %principal.username, "caller authenticated");
    }
    request.extensions_mut().insert(caller);

    let response = next.run(request).await;

    if response.extensions().get::<LoginRequired>().is_none() {
        return response;
    }

    let location = login_redirect(&identity.login_url, &target);
    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode login redirect");
            response
        }
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn login_redirect(login_url: &str, target: &str) -> String {
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}next={}", urlencoding::encode(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_requires_scheme_and_value() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }

    #[test]
    fn login_redirect_keeps_the_original_target() {
        assert_eq!(
            login_redirect("/api/accounts/login", "/api/catalog/mybooks?page=2"),
            "/api/accounts/login?next=%2Fapi%2Fcatalog%2Fmybooks%3Fpage%3D2"
        );
        assert_eq!(
            login_redirect("/login?sso=1", "/api/catalog/borrowed"),
            "/login?sso=1&next=%2Fapi%2Fcatalog%2Fborrowed"
        );
    }
}
