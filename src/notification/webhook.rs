//! A client for posting payloads to webhook endpoints.

use crate::core::Endpoint;
use crate::notification::discord::WebhookPayload;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a single delivery failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The endpoint answered with a non-success status.
    #[error("Error posting to webhook: {reason}")]
    Status {
        status: StatusCode,
        reason: String,
        body: String,
    },
    /// The request could not be completed (connection, TLS, timeout...).
    #[error("HTTP request to webhook failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl DeliveryError {
    /// Builds a status error whose reason is the canonical status text.
    pub fn from_status(status: StatusCode, body: String) -> Self {
        DeliveryError::Status {
            status,
            reason: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
            body,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DeliveryError::Status { status, .. } => Some(*status),
            DeliveryError::Request(e) => e.status(),
        }
    }
}

/// Something that can POST a payload to an endpoint.
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn post(&self, endpoint: &Endpoint, payload: &WebhookPayload) -> Result<(), DeliveryError>;
}

/// `WebhookClient` backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    /// Creates a client. `timeout` bounds each request; `None` leaves
    /// requests unbounded.
    pub fn new(timeout: Option<Duration>) -> Result<Self, DeliveryError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn post(&self, endpoint: &Endpoint, payload: &WebhookPayload) -> Result<(), DeliveryError> {
        let response = self.client.post(endpoint.url()).json(payload).send().await?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %endpoint, status = %status, "Webhook accepted payload");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::from_status(status, body))
    }
}
