//! HTTP client for the inventory service.

use boxoffice_core::{
    BoxFuture, ClientError, DateTime, EventId, EventInventory, InventoryClient, PrincipalId,
    SeatQuantity, Utc,
};
use boxoffice_web::{CORRELATION_ID_HEADER, current_correlation_id};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Event as served by `GET /events/:id`.
#[derive(Debug, Deserialize)]
struct RemoteEvent {
    id: EventId,
    title: String,
    description: String,
    starts_at: DateTime<Utc>,
    owner: String,
    remaining_seats: u64,
}

impl From<RemoteEvent> for EventInventory {
    fn from(event: RemoteEvent) -> Self {
        Self::restore(
            event.id,
            event.title,
            event.description,
            event.starts_at,
            PrincipalId::new(event.owner),
            event.remaining_seats,
        )
    }
}

/// Error body produced by the inventory service.
#[derive(Debug, Deserialize)]
struct RemoteError {
    message: String,
}

/// [`InventoryClient`] talking JSON over HTTP.
///
/// Every request is bounded by the configured timeout; a timeout surfaces as
/// [`ClientError::Transport`] and leaves the remote effect unknown. Requests made
/// inside [`with_correlation_id`](boxoffice_web::with_correlation_id) carry the id as
/// `X-Correlation-ID`.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: Client,
    base_url: String,
}

impl HttpInventoryClient {
    /// Create a client for the service at `base_url` (e.g. `http://localhost:8081`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        event_id: EventId,
        path: &str,
        quantity: Option<i64>,
    ) -> Result<T, ClientError> {
        let url = format!("{}/events/{event_id}{path}", self.base_url);
        let mut request = self.client.request(method, &url);
        if let Some(quantity) = quantity {
            request = request.query(&[("quantity", quantity)]);
        }
        if let Some(correlation_id) = current_correlation_id() {
            request = request.header(CORRELATION_ID_HEADER, correlation_id.to_string());
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "Inventory request failed");
            ClientError::Transport(e.to_string())
        })?;

        match response.status() {
            StatusCode::OK => response
                .json::<T>()
                .await
                .map_err(|e| ClientError::Decode(e.to_string())),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(event_id)),
            StatusCode::BAD_REQUEST => {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<RemoteError>(&body)
                    .map(|e| e.message)
                    .unwrap_or(body);
                Err(ClientError::InvalidArgument(message))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(url = %url, status = status.as_u16(), "Inventory service error");
                Err(ClientError::Remote {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }
}

impl InventoryClient for HttpInventoryClient {
    fn get_inventory(&self, event_id: EventId) -> BoxFuture<'_, Result<EventInventory, ClientError>> {
        Box::pin(async move {
            let event: RemoteEvent = self.call(Method::GET, event_id, "", None).await?;
            Ok(event.into())
        })
    }

    fn check_availability(
        &self,
        event_id: EventId,
        quantity: i64,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(self.call(Method::GET, event_id, "/availability", Some(quantity)))
    }

    fn reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(async move {
            let quantity = wire_quantity(quantity)?;
            self.call(Method::PUT, event_id, "/reserve", Some(quantity)).await
        })
    }

    fn rollback_reserve_seats(
        &self,
        event_id: EventId,
        quantity: SeatQuantity,
    ) -> BoxFuture<'_, Result<bool, ClientError>> {
        Box::pin(async move {
            let quantity = wire_quantity(quantity)?;
            self.call(Method::PUT, event_id, "/rollback", Some(quantity)).await
        })
    }
}

fn wire_quantity(quantity: SeatQuantity) -> Result<i64, ClientError> {
    i64::try_from(quantity.get())
        .map_err(|_| ClientError::InvalidArgument(format!("quantity {quantity} exceeds i64")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serde_json::json;
    use boxoffice_web::with_correlation_id;
    use uuid::Uuid;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn qty(n: i64) -> SeatQuantity {
        SeatQuantity::new(n).unwrap()
    }

    async fn client_for(server: &MockServer) -> HttpInventoryClient {
        HttpInventoryClient::new(format!("{}/", server.uri()), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_reserve_decodes_bool() {
        let server = MockServer::start().await;
        let event_id = EventId::new();
        Mock::given(method("PUT"))
            .and(path(format!("/events/{event_id}/reserve")))
            .and(query_param("quantity", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(false)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.reserve_seats(event_id, qty(3)).await, Ok(false));
    }

    #[tokio::test]
    async fn test_rollback_decodes_bool() {
        let server = MockServer::start().await;
        let event_id = EventId::new();
        Mock::given(method("PUT"))
            .and(path(format!("/events/{event_id}/rollback")))
            .and(query_param("quantity", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(client.rollback_reserve_seats(event_id, qty(2)).await, Ok(true));
    }

    #[tokio::test]
    async fn test_forwards_correlation_id() {
        let server = MockServer::start().await;
        let event_id = EventId::new();
        let correlation_id = Uuid::new_v4();
        Mock::given(method("PUT"))
            .and(path(format!("/events/{event_id}/reserve")))
            .and(header(CORRELATION_ID_HEADER, correlation_id.to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(true)))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path(format!("/events/{event_id}/reserve")))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let reserved =
            with_correlation_id(correlation_id, client.reserve_seats(event_id, qty(1))).await;
        assert_eq!(reserved, Ok(true));

        // Outside a scope no id is sent, so only the catch-all mock matches.
        assert!(matches!(
            client.reserve_seats(event_id, qty(1)).await,
            Err(ClientError::Remote { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        let missing = EventId::new();
        let invalid = EventId::new();
        let broken = EventId::new();

        Mock::given(path(format!("/events/{missing}/availability")))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(path(format!("/events/{invalid}/availability")))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "INVALID_ARGUMENT",
                "message": "Invalid quantity 0: must be a positive integer",
            })))
            .mount(&server)
            .await;
        Mock::given(path(format!("/events/{broken}/availability")))
            .respond_with(ResponseTemplate::new(503).set_body_string("lock backend down"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert_eq!(
            client.check_availability(missing, 1).await,
            Err(ClientError::NotFound(missing))
        );
        assert_eq!(
            client.check_availability(invalid, 0).await,
            Err(ClientError::InvalidArgument(
                "Invalid quantity 0: must be a positive integer".to_string()
            ))
        );
        assert_eq!(
            client.check_availability(broken, 1).await,
            Err(ClientError::Remote {
                status: 503,
                message: "lock backend down".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_garbled_body_is_decode_error() {
        let server = MockServer::start().await;
        let event_id = EventId::new();
        Mock::given(path(format!("/events/{event_id}/reserve")))
            .respond_with(ResponseTemplate::new(200).set_body_string("yes"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        assert!(matches!(
            client.reserve_seats(event_id, qty(1)).await,
            Err(ClientError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_get_inventory() {
        let server = MockServer::start().await;
        let event_id = EventId::new();
        Mock::given(method("GET"))
            .and(path(format!("/events/{event_id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": event_id,
                "title": "Spring Concert",
                "description": "Main hall",
                "starts_at": "2025-06-01T19:30:00Z",
                "owner": "owner@x.com",
                "remaining_seats": 42,
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let event = client.get_inventory(event_id).await.unwrap();
        assert_eq!(event.id, event_id);
        assert_eq!(event.remaining_seats(), 42);
        assert_eq!(event.owner.as_str(), "owner@x.com");
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        let event_id = EventId::new();
        Mock::given(path(format!("/events/{event_id}/reserve")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!(true))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = HttpInventoryClient::new(server.uri(), Duration::from_millis(50)).unwrap();
        assert!(matches!(
            client.reserve_seats(event_id, qty(1)).await,
            Err(ClientError::Transport(_))
        ));
    }
}
