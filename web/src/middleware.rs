//! Correlation ID middleware.
//!
//! 1. **Extract** the correlation ID from `X-Correlation-ID` (or generate a new UUID)
//! 2. **Store** it in request extensions for the [`CorrelationId`](crate::CorrelationId) extractor
//! 3. **Create** a tracing span carrying it
//! 4. **Echo** it in the response `X-Correlation-ID` header
//!
//! Handlers that call another service wrap the call in [`with_correlation_id`];
//! outbound clients read it back with [`current_correlation_id`] and forward it
//! as `X-Correlation-ID`.
//!
//! # Example
//!
//! ```ignore
//! use axum::Router;
//! use boxoffice_web::middleware::correlation_id_layer;
//!
//! let app = Router::new()
//!     .route("/events", get(list_events))
//!     .layer(correlation_id_layer());
//! ```

use axum::{extract::Request, http::HeaderValue, response::Response};
use std::future::Future;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::Instrument;
use uuid::Uuid;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

tokio::task_local! {
    static OUTBOUND_CORRELATION_ID: Uuid;
}

/// Run `fut` with `id` as the correlation id for outgoing service calls.
///
/// The id is task-local: work spawned from `fut` must capture
/// [`current_correlation_id`] and re-enter this scope itself.
pub async fn with_correlation_id<F: Future>(id: Uuid, fut: F) -> F::Output {
    OUTBOUND_CORRELATION_ID.scope(id, fut).await
}

/// The correlation id of the enclosing [`with_correlation_id`], if any.
#[must_use]
pub fn current_correlation_id() -> Option<Uuid> {
    OUTBOUND_CORRELATION_ID.try_with(|id| *id).ok()
}

/// Create a layer that adds correlation ID tracking to all requests.
#[must_use]
pub const fn correlation_id_layer() -> CorrelationIdLayer {
    CorrelationIdLayer
}

/// Layer for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdLayer;

impl<S> Layer<S> for CorrelationIdLayer {
    type Service = CorrelationIdMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationIdMiddleware { inner }
    }
}

/// Middleware service for correlation ID tracking.
#[derive(Clone, Debug)]
pub struct CorrelationIdMiddleware<S> {
    inner: S,
}

impl<S> Service<Request> for CorrelationIdMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let correlation_id = req
            .headers()
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        req.extensions_mut().insert(correlation_id);

        let span = tracing::info_span!(
            "http_request",
            correlation_id = %correlation_id,
            method = %req.method(),
            uri = %req.uri(),
        );

        let fut = self.inner.call(req);

        Box::pin(async move {
            let mut response = fut.instrument(span).await?;

            if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
                response
                    .headers_mut()
                    .insert(CORRELATION_ID_HEADER, header_value);
            }

            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::extractors::CorrelationId;
    use axum::{Router, body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/test",
                get(|CorrelationId(id): CorrelationId| async move { id.to_string() }),
            )
            .layer(correlation_id_layer())
    }

    #[tokio::test]
    async fn test_correlation_id_generated_if_missing() {
        let response = app()
            .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap()
            .to_string();
        assert!(Uuid::parse_str(&header).is_ok());

        // The handler saw the same id the middleware generated.
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(std::str::from_utf8(&body).unwrap(), header);
    }

    #[tokio::test]
    async fn test_correlation_id_preserved_from_request() {
        let request_uuid = Uuid::new_v4();
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/test")
                    .header(CORRELATION_ID_HEADER, request_uuid.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let response_id = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("Correlation ID header should be present")
            .to_str()
            .unwrap();
        assert_eq!(response_id, request_uuid.to_string());
    }

    #[tokio::test]
    async fn test_outbound_correlation_id_is_scoped() {
        assert_eq!(current_correlation_id(), None);

        let id = Uuid::new_v4();
        let seen = with_correlation_id(id, async {
            tokio::task::yield_now().await;
            current_correlation_id()
        })
        .await;
        assert_eq!(seen, Some(id));

        // Spawned tasks do not inherit the scope.
        let spawned = with_correlation_id(id, async {
            tokio::spawn(async { current_correlation_id() }).await.unwrap()
        })
        .await;
        assert_eq!(spawned, None);
        assert_eq!(current_correlation_id(), None);
    }
}
