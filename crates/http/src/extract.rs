//! Request extractors whose rejections use the [`AppError`] envelope.

use axum::{
    extract::{FromRequestParts, Query as AxumQuery},
    http::request::Parts,
};
use libris_authz::Caller;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::session::Session;

/// Query-string extractor rejecting with a 400 [`AppError`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Query<T>(pub T);

impl<T, S> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AxumQuery(value) = AxumQuery::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
        Ok(Query(value))
    }
}

/// The caller resolved by the identity middleware; anonymous when absent.
#[derive(Debug, Clone)]
pub struct CurrentCaller(pub Caller);

impl<S> FromRequestParts<S> for CurrentCaller
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentCaller(
            parts.extensions.get::<Caller>().cloned().unwrap_or_default(),
        ))
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| {
                AppError::Internal(anyhow::anyhow!("session middleware is not installed"))
            })
    }
}

/// Decode a JSON request body. Called by handlers after their permission gate
/// so that authorization never depends on the shape of the payload.
pub fn json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::bad_request(format!("invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Genre {
        name: String,
    }

    #[test]
    fn json_body_decodes_payload() {
        let genre: Genre = json_body(br#"{"name": "Poetry"}"#).unwrap();
        assert_eq!(
            genre,
            Genre {
                name: "Poetry".to_string()
            }
        );
    }

    #[test]
    fn json_body_rejects_garbage_as_bad_request() {
        let err = json_body::<Genre>(b"{not json").unwrap_err();
        assert!(matches!(err, AppError::BadRequest { .. }));
    }
}
