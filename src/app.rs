//! The main application logic, decoupled from the entry point.

use crate::{
    config::Config,
    core::Endpoint,
    internal_metrics::Metrics,
    network::{MessageSource, RedisSubscriber, ReleaseListener, Subscribe},
    notification::{Dispatcher, HttpWebhookClient, WebhookClient},
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};

/// How long running tasks get to stop after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config, endpoints: Vec<Endpoint>) -> AppBuilder {
        AppBuilder::new(config, endpoints)
    }

    /// Waits for the shutdown signal and then gracefully shuts down all tasks.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.shutdown_rx();
        if !*shutdown_rx.borrow_and_update() {
            shutdown_rx.changed().await.ok();
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown(SHUTDOWN_GRACE).await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them and lets tests
/// replace the subscription and the HTTP client.
pub struct AppBuilder {
    config: Config,
    endpoints: Vec<Endpoint>,
    task_manager: Option<TaskManager>,
    source_override: Option<Box<dyn MessageSource>>,
    webhook_client_override: Option<Arc<dyn WebhookClient>>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    pub fn new(config: Config, endpoints: Vec<Endpoint>) -> Self {
        Self {
            config,
            endpoints,
            task_manager: None,
            source_override: None,
            webhook_client_override: None,
            metrics_override: None,
        }
    }

    /// Uses an existing task manager, e.g. one shared with a metrics task.
    pub fn task_manager(mut self, task_manager: TaskManager) -> Self {
        self.task_manager = Some(task_manager);
        self
    }

    /// Reads messages from `source` instead of subscribing to Redis. The
    /// listener stops when the source ends.
    pub fn source_override(mut self, source: Box<dyn MessageSource>) -> Self {
        self.source_override = Some(source);
        self
    }

    /// Overrides the HTTP client used for deliveries.
    pub fn webhook_client_override(mut self, client: Arc<dyn WebhookClient>) -> Self {
        self.webhook_client_override = Some(client);
        self
    }

    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Builds all components, subscribes to the channel and starts the listener.
    ///
    /// Fails if the configuration is invalid or the initial subscription
    /// cannot be established.
    #[instrument(skip_all)]
    pub async fn build(self) -> Result<App> {
        let config = self.config;
        config.validate(&self.endpoints)?;

        let task_manager = self.task_manager.unwrap_or_default();
        let metrics = self.metrics_override.unwrap_or_default();

        let client: Arc<dyn WebhookClient> = match self.webhook_client_override {
            Some(client) => client,
            None => Arc::new(
                HttpWebhookClient::new(config.request_timeout())
                    .context("Failed to build HTTP client")?,
            ),
        };

        info!(
            endpoints = ?self.endpoints.iter().map(Endpoint::name).collect::<Vec<_>>(),
            "Configured webhook endpoints"
        );
        let dispatcher = Dispatcher::new(self.endpoints, client, config.embed.clone(), metrics.clone());
        let listener = ReleaseListener::new(dispatcher, metrics);

        match self.source_override {
            Some(source) => {
                let mut shutdown_rx = task_manager.shutdown_rx();
                task_manager.spawn("ReleaseListener", async move {
                    listener.run_with_source(source, &mut shutdown_rx).await;
                });
            }
            None => {
                // `validate` guarantees the URL is present.
                let url = config.transport.url.as_deref().unwrap_or_default();
                let subscriber = RedisSubscriber::new(url, config.transport.channel.clone())?;
                let source = subscriber.subscribe().await?;
                info!("connected to Redis");
                task_manager.spawn(
                    "ReleaseListener",
                    listener.run(subscriber, source, task_manager.shutdown_rx()),
                );
            }
        }

        info!("release-relay initialized successfully. Waiting for release events...");

        Ok(App { task_manager })
    }
}
