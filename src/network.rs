//! Pub/sub client for the release update channel
//!
//! This module handles subscribing to the Redis channel, decoding messages
//! into release events and handing them to the dispatcher, and re-subscribing
//! when the connection drops.

use crate::core::ReleaseEvent;
use crate::internal_metrics::Metrics;
use crate::notification::Dispatcher;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const INITIAL_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60_000;

/// Decodes a raw channel message into a release event.
///
/// # Returns
/// * `Ok(ReleaseEvent)` for a well-formed message
/// * `Err` if the payload is not JSON or lacks `release`/`diffs`
pub fn parse_message(text: &str) -> Result<ReleaseEvent> {
    Ok(serde_json::from_str(text)?)
}

/// A subscription that yields raw message payloads, one at a time.
#[async_trait]
pub trait MessageSource: Send {
    /// Reads the next message.
    ///
    /// # Returns
    /// * `Some(Ok(payload))` for a received message
    /// * `Some(Err(error))` if a message could not be read
    /// * `None` once the subscription has ended
    async fn next_message(&mut self) -> Option<Result<String>>;
}

/// Opens a fresh subscription, initially and after the previous one drops.
#[async_trait]
pub trait Subscribe: Send + Sync {
    /// The channel subscriptions are opened on.
    fn channel(&self) -> &str;

    async fn subscribe(&self) -> Result<Box<dyn MessageSource>>;
}

/// A live Redis pub/sub subscription.
pub struct RedisSource {
    messages: BoxStream<'static, redis::Msg>,
}

#[async_trait]
impl MessageSource for RedisSource {
    async fn next_message(&mut self) -> Option<Result<String>> {
        let msg = self.messages.next().await?;
        Some(
            msg.get_payload::<String>()
                .with_context(|| format!("Unreadable payload on channel {}", msg.get_channel_name())),
        )
    }
}

/// Opens Redis subscriptions to one channel.
#[derive(Clone, Debug)]
pub struct RedisSubscriber {
    client: redis::Client,
    channel: String,
}

impl RedisSubscriber {
    pub fn new(url: &str, channel: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url).context("Invalid Redis URL")?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }
}

#[async_trait]
impl Subscribe for RedisSubscriber {
    fn channel(&self) -> &str {
        &self.channel
    }

    /// Connects and subscribes.
    async fn subscribe(&self) -> Result<Box<dyn MessageSource>> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .context("Failed to connect to Redis")?;
        pubsub
            .subscribe(&self.channel)
            .await
            .with_context(|| format!("Failed to subscribe to channel {}", self.channel))?;
        info!(channel = %self.channel, "Subscribed to update channel");

        Ok(Box::new(RedisSource {
            messages: pubsub.into_on_message().boxed(),
        }))
    }
}

/// Reads release events from a subscription and dispatches each one.
#[derive(Clone)]
pub struct ReleaseListener {
    dispatcher: Dispatcher,
    metrics: Metrics,
}

impl ReleaseListener {
    pub fn new(dispatcher: Dispatcher, metrics: Metrics) -> Self {
        Self {
            dispatcher,
            metrics,
        }
    }

    /// Decodes and dispatches one raw message.
    ///
    /// Malformed messages are logged and skipped. Deliveries are started but
    /// not awaited.
    pub fn handle_message(&self, text: &str) {
        self.metrics.events_received_total.increment(1);
        match parse_message(text) {
            Ok(event) => {
                // Delivery tasks run detached.
                drop(self.dispatcher.dispatch(event));
            }
            Err(e) => {
                self.metrics.events_malformed_total.increment(1);
                warn!(error = %e, "Skipping malformed release event");
            }
        }
    }

    /// Processes messages from `source` until it ends or shutdown is signalled.
    ///
    /// Returns `true` if it stopped because of shutdown.
    pub async fn run_with_source(
        &self,
        mut source: Box<dyn MessageSource>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> bool {
        debug!("Starting release event processing");

        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => {
                    info!("Release listener received shutdown signal.");
                    return true;
                }
                message = source.next_message() => message,
            };

            match message {
                Some(Ok(text)) => self.handle_message(&text),
                Some(Err(e)) => {
                    self.metrics.events_malformed_total.increment(1);
                    warn!(error = %e, "Failed to read message from subscription");
                }
                None => {
                    info!("Subscription closed");
                    return false;
                }
            }
        }
    }

    /// Runs `initial` and re-subscribes with exponential backoff whenever the
    /// subscription drops, until shutdown.
    pub async fn run<S: Subscribe>(
        self,
        subscriber: S,
        initial: Box<dyn MessageSource>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut source = Some(initial);
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            if let Some(current) = source.take() {
                if self.run_with_source(current, &mut shutdown_rx).await {
                    break;
                }
                backoff_ms = INITIAL_BACKOFF_MS;
            }

            info!("Reconnecting to channel {} in {} ms", subscriber.channel(), backoff_ms);
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(Duration::from_millis(backoff_ms)) => {}
            }
            backoff_ms = next_backoff(backoff_ms);

            match subscriber.subscribe().await {
                Ok(new_source) => {
                    self.metrics.transport_reconnects_total.increment(1);
                    source = Some(new_source);
                }
                Err(e) => error!(error = %e, "Reconnect failed"),
            }
        }

        info!("Release listener finished.");
    }
}

fn next_backoff(current_ms: u64) -> u64 {
    std::cmp::min(current_ms * 2, MAX_BACKOFF_MS)
}
