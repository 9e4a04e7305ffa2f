//! Fans a release event out to every configured webhook endpoint.

use crate::config::EmbedConfig;
use crate::core::{Endpoint, ReleaseEvent};
use crate::internal_metrics::Metrics;
use crate::notification::discord::build_payload;
use crate::notification::webhook::{DeliveryError, WebhookClient};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// What happened to a delivery that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The payload was accepted by the endpoint.
    Sent,
    /// The event had no relayed categories, so no request was made.
    Skipped,
}

/// Delivers release events to a fixed set of endpoints.
///
/// Cloning is cheap; all state is shared and immutable.
#[derive(Clone)]
pub struct Dispatcher {
    endpoints: Arc<[Endpoint]>,
    client: Arc<dyn WebhookClient>,
    embed: Arc<EmbedConfig>,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(
        endpoints: Vec<Endpoint>,
        client: Arc<dyn WebhookClient>,
        embed: EmbedConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            endpoints: endpoints.into(),
            client,
            embed: Arc::new(embed),
            metrics,
        }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Formats `event` and posts it to a single endpoint.
    ///
    /// An event with nothing to relay is skipped without a request. A failed
    /// request is returned to the caller; nothing is retried.
    pub async fn deliver(
        &self,
        endpoint: &Endpoint,
        event: &ReleaseEvent,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let Some(payload) = build_payload(event, &self.embed) else {
            debug!("No relayed categories in event, skipping endpoint");
            return Ok(DeliveryOutcome::Skipped);
        };

        self.client.post(endpoint, &payload).await?;
        Ok(DeliveryOutcome::Sent)
    }

    /// Delivers to one endpoint, then logs and counts the outcome.
    #[instrument(name = "delivery", skip_all, fields(endpoint = %endpoint, release = %event.release))]
    async fn deliver_and_record(&self, endpoint: &Endpoint, event: &ReleaseEvent) {
        match self.deliver(endpoint, event).await {
            Ok(DeliveryOutcome::Sent) => {
                self.metrics.deliveries_sent_total.increment(1);
                info!("Posted release notes to webhook");
            }
            Ok(DeliveryOutcome::Skipped) => {
                self.metrics.deliveries_skipped_total.increment(1);
            }
            Err(e) => {
                self.metrics.deliveries_failed_total.increment(1);
                match &e {
                    DeliveryError::Status { status, body, .. } => {
                        error!(status = %status, body = %body, error = %e, "Webhook delivery failed")
                    }
                    DeliveryError::Request(_) => error!(error = %e, "Webhook delivery failed"),
                }
            }
        }
    }

    /// Starts one independent delivery task per endpoint and returns without
    /// waiting for them.
    ///
    /// Each task logs and discards its own failure, so one endpoint can never
    /// affect another. The handles may be awaited or simply dropped.
    pub fn dispatch(&self, event: ReleaseEvent) -> Vec<JoinHandle<()>> {
        let event = Arc::new(event);
        info!(
            release = %event.release,
            endpoints = self.endpoints.len(),
            "Dispatching release event"
        );

        self.endpoints
            .iter()
            .cloned()
            .map(|endpoint| {
                let dispatcher = self.clone();
                let event = event.clone();
                tokio::spawn(async move { dispatcher.deliver_and_record(&endpoint, &event).await })
            })
            .collect()
    }
}
