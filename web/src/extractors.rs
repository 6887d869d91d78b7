//! Custom Axum extractors.
//!
//! - [`CallerIdentity`]: the principal named by the `X-User` header
//! - [`CorrelationId`]: the request correlation id, or a fresh one

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use boxoffice_core::PrincipalId;
use uuid::Uuid;

/// Header carrying the caller's identity.
pub const USER_HEADER: &str = "X-User";

/// Identity of the caller, taken verbatim (trimmed) from `X-User`.
///
/// Authentication happens upstream; a request without the header is rejected with
/// 401 before any handler logic runs.
///
/// # Example
///
/// ```ignore
/// async fn mine(CallerIdentity(owner): CallerIdentity) -> String {
///     format!("Hello {owner}")
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub PrincipalId);

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<PrincipalId>().ok())
            .map(Self)
            .ok_or_else(|| AppError::unauthorized(format!("Missing or empty {USER_HEADER} header")))
    }
}

/// Correlation ID for request tracing.
///
/// Reuses the id placed in the request extensions by
/// [`correlation_id_layer`](crate::middleware::correlation_id_layer), falls back to the
/// `X-Correlation-ID` header, and otherwise generates a new UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let correlation_id = parts.extensions.get::<Uuid>().copied().unwrap_or_else(|| {
            parts
                .headers
                .get(CORRELATION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_else(Uuid::new_v4)
        });

        Ok(Self(correlation_id))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route(
            "/whoami",
            get(|CallerIdentity(who): CallerIdentity| async move { who.to_string() }),
        )
    }

    #[tokio::test]
    async fn test_caller_identity_from_header() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/whoami")
                    .header(USER_HEADER, " a@x.com ")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"a@x.com");
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        for header in [None, Some("   ")] {
            let mut request = Request::builder().uri("/whoami");
            if let Some(value) = header {
                request = request.header(USER_HEADER, value);
            }
            let response = app()
                .oneshot(request.body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
