//! Configuration management for release-relay
//!
//! This module defines the main `Config` struct and its sub-structs. It uses
//! the `figment` crate to layer built-in defaults, an optional TOML file,
//! environment variables and command-line flags.
//!
//! Webhook endpoints are discovered separately from the process environment:
//! every variable whose name starts with `webhooks.env_prefix` is treated as a
//! webhook URL.

use crate::cli::Cli;
use crate::core::Endpoint;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "release-relay.toml";

/// Startup validation failures. Any of these stops the process before it
/// connects to the transport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No Redis URL provided (set REDIS_URL or transport.url)")]
    MissingTransportUrl,
    #[error("No webhooks provided (set {prefix}* variables or webhooks.urls)")]
    NoEndpoints { prefix: String },
    #[error("Webhook {name} is not a valid URL: {reason}")]
    InvalidEndpoint { name: String, reason: String },
}

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub core: CoreConfig,
    pub transport: TransportConfig,
    pub webhooks: WebhooksConfig,
    pub embed: EmbedConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CoreConfig {
    /// Default log filter, used when `RUST_LOG` is unset.
    pub log_level: String,
}

/// Configuration for the pub/sub subscription.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TransportConfig {
    /// Redis connection URL, e.g. `redis://127.0.0.1:6379`.
    pub url: Option<String>,
    /// The channel release diffs are published on.
    pub channel: String,
}

/// Configuration for outbound webhooks.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WebhooksConfig {
    /// Environment variables starting with this prefix hold webhook URLs.
    pub env_prefix: String,
    /// Additional webhook URLs, appended after the discovered ones.
    #[serde(default)]
    pub urls: Vec<String>,
    /// Per-request timeout. No timeout when unset.
    pub request_timeout_seconds: Option<u64>,
}

/// Appearance of the posted message.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbedConfig {
    pub username: String,
    pub avatar_url: String,
    pub color: u32,
    /// Embed description. `{release}` is replaced by the release id.
    pub description_template: String,
    /// Post without triggering push notifications.
    pub silent: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Periodically log a snapshot of all counters.
    pub log_metrics: bool,
    pub log_interval_seconds: u64,
}

impl Config {
    /// Loads the configuration, layering defaults, the TOML file, environment
    /// variables and the parsed command-line arguments.
    pub fn load_from_cli(cli: Cli) -> Result<Self> {
        let figment = Self::figment(&cli)?;
        Ok(figment.merge(cli).extract()?)
    }

    fn figment(cli: &Cli) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        match &cli.config {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found at specified path: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
                }
            }
        }

        Ok(figment
            // e.g. RELAY_TRANSPORT__CHANNEL=updates
            .merge(Env::prefixed("RELAY_").split("__"))
            .merge(
                Env::raw()
                    .only(&["REDIS_URL"])
                    .map(|_| "transport.url".into()),
            ))
    }

    /// Collects the webhook endpoints from `vars` and `webhooks.urls`.
    ///
    /// Variables are matched on `webhooks.env_prefix` and ordered by name.
    pub fn endpoints<I>(&self, vars: I) -> Vec<Endpoint>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let discovered: BTreeMap<String, String> = vars
            .into_iter()
            .filter(|(key, value)| key.starts_with(&self.webhooks.env_prefix) && !value.trim().is_empty())
            .collect();

        let configured = self
            .webhooks
            .urls
            .iter()
            .enumerate()
            .filter(|(_, url)| !url.trim().is_empty())
            .map(|(i, url)| Endpoint::new(format!("webhooks.urls[{}]", i), url.trim()));

        discovered
            .into_iter()
            .map(|(key, url)| Endpoint::new(key, url.trim()))
            .chain(configured)
            .collect()
    }

    /// Collects the webhook endpoints from the process environment.
    pub fn endpoints_from_env(&self) -> Vec<Endpoint> {
        self.endpoints(utf8_vars(std::env::vars_os()))
    }

    /// Checks that the relay has something to read from and somewhere to post to.
    pub fn validate(&self, endpoints: &[Endpoint]) -> Result<(), ConfigError> {
        match &self.transport.url {
            Some(url) if !url.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingTransportUrl),
        }

        if endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints {
                prefix: self.webhooks.env_prefix.clone(),
            });
        }

        for endpoint in endpoints {
            let url = reqwest::Url::parse(endpoint.url()).map_err(|e| ConfigError::InvalidEndpoint {
                name: endpoint.name().to_string(),
                reason: e.to_string(),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidEndpoint {
                    name: endpoint.name().to_string(),
                    reason: format!("unsupported scheme `{}`", url.scheme()),
                });
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.webhooks.request_timeout_seconds.map(Duration::from_secs)
    }
}

/// Drops variables whose name or value is not valid UTF-8.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig {
                log_level: "info".to_string(),
            },
            transport: TransportConfig {
                url: None,
                channel: "update".to_string(),
            },
            webhooks: WebhooksConfig {
                env_prefix: "DISCORD_WEBHOOK".to_string(),
                urls: vec![],
                request_timeout_seconds: None,
            },
            embed: EmbedConfig::default(),
            metrics: MetricsConfig {
                log_metrics: false,
                log_interval_seconds: 60,
            },
        }
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            username: "RBX Release Tracker".to_string(),
            avatar_url: "https://i.imgur.com/YWC5JA3.png".to_string(),
            color: 16748288,
            description_template: "Roblox has pushed some changes to the release notes! check them out here or go and see the [version notes](https://github.com/OutOfBears/rbx-release-tracker/blob/main/docs/release-{release}.md)".to_string(),
            silent: true,
        }
    }
}
