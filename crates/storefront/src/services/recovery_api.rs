//! Client for the remote order recovery endpoint.
//!
//! Last resort before the placeholder fallback: asks the order backend for
//! the details of an order number. Whatever it returns is shown but never
//! trusted as customer-entered data.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use lupul_core::OrderNumber;
use lupul_core::order::Order;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur when calling the recovery endpoint.
#[derive(Debug, Error)]
pub enum RecoveryApiError {
    /// HTTP request failed or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Endpoint URL could not be built.
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Looks orders up on the remote order backend.
#[async_trait]
pub trait OrderLookup: Send + Sync {
    /// Fetch the order, `Ok(None)` when the backend does not know it.
    ///
    /// # Errors
    ///
    /// Returns `RecoveryApiError` if the backend cannot be reached or
    /// answers with an error.
    async fn fetch(&self, order_number: &OrderNumber) -> Result<Option<Order>, RecoveryApiError>;
}

/// Response body: either the order itself or `{"order": {...}}`.
///
/// `Bare` goes first; an absent `order` field also satisfies `Wrapped`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LookupResponse {
    Bare(Order),
    Wrapped { order: Option<Order> },
}

impl LookupResponse {
    fn into_order(self) -> Option<Order> {
        match self {
            Self::Wrapped { order } => order,
            Self::Bare(order) => Some(order),
        }
    }
}

/// HTTP client for `GET {base}/get-order-details?orderId=`.
#[derive(Clone)]
pub struct RecoveryApiClient {
    client: reqwest::Client,
    endpoint: Option<Url>,
}

impl RecoveryApiClient {
    /// Create a client. Without a base URL every lookup is a miss.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build or the endpoint URL is
    /// invalid.
    pub fn new(base_url: Option<&Url>) -> Result<Self, RecoveryApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let endpoint = base_url
            .map(|base| endpoint_url(base))
            .transpose()?;

        Ok(Self { client, endpoint })
    }
}

fn endpoint_url(base: &Url) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("get-order-details")
}

#[async_trait]
impl OrderLookup for RecoveryApiClient {
    async fn fetch(&self, order_number: &OrderNumber) -> Result<Option<Order>, RecoveryApiError> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(None);
        };

        let response = self
            .client
            .get(endpoint.clone())
            .query(&[("orderId", order_number.as_str())])
            .send()
            .await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RecoveryApiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: LookupResponse = response.json().await?;
        Ok(body
            .into_order()
            .filter(|order| &order.order_number == order_number))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let base = Url::parse("https://api.example.ro/functions").unwrap();
        assert_eq!(
            endpoint_url(&base).unwrap().as_str(),
            "https://api.example.ro/functions/get-order-details"
        );

        let base = Url::parse("https://api.example.ro/").unwrap();
        assert_eq!(
            endpoint_url(&base).unwrap().as_str(),
            "https://api.example.ro/get-order-details"
        );
    }

    #[test]
    fn test_response_shapes() {
        let wrapped: LookupResponse =
            serde_json::from_str(r#"{"order":{"orderNumber":"LC-1","totalAmount":"40"}}"#).unwrap();
        let order = wrapped.into_order().unwrap();
        assert_eq!(order.order_number.as_str(), "LC-1");
        assert_eq!(order.customer_email, "N/A");

        let bare: LookupResponse =
            serde_json::from_str(r#"{"orderId":"LC-2","customerName":"Ana"}"#).unwrap();
        assert_eq!(bare.into_order().unwrap().customer_name, "Ana");

        let empty: LookupResponse = serde_json::from_str(r#"{"order":null}"#).unwrap();
        assert!(empty.into_order().is_none());
    }

    #[test]
    fn test_bare_order_is_not_read_as_empty_wrapper() {
        let bare: LookupResponse = serde_json::from_str(
            r#"{"orderNumber":"LC-9","customerName":"Ana","customerEmail":"ana@site.ro","totalAmount":"55"}"#,
        )
        .unwrap();
        assert!(matches!(bare, LookupResponse::Bare(_)));

        let order = bare.into_order().unwrap();
        assert_eq!(order.order_number.as_str(), "LC-9");
        assert_eq!(order.customer_email, "ana@site.ro");
    }

    #[tokio::test]
    async fn test_unconfigured_client_misses() {
        let client = RecoveryApiClient::new(None).unwrap();
        let result = client.fetch(&OrderNumber::new("LC-1")).await.unwrap();
        assert!(result.is_none());
    }
}
