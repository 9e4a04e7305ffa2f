//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged on top of
//! the configuration file and environment variables.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Relays release note diffs from a Redis channel to chat webhooks.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Path to a dotenv file to load before reading the environment.
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Redis connection URL.
    #[arg(long, value_name = "URL")]
    pub redis_url: Option<String>,

    /// Pub/sub channel to subscribe to.
    #[arg(long, value_name = "NAME")]
    pub channel: Option<String>,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "release_relay=debug").
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Additional webhook URL. May be repeated.
    #[arg(long = "webhook", value_name = "URL")]
    pub webhooks: Vec<String>,

    /// Periodically log a snapshot of the internal counters.
    #[arg(long)]
    pub log_metrics: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            insert_nested(&mut dict, "core", "log_level", Value::from(level.clone()));
        }

        if let Some(url) = &self.redis_url {
            insert_nested(&mut dict, "transport", "url", Value::from(url.clone()));
        }

        if let Some(channel) = &self.channel {
            insert_nested(&mut dict, "transport", "channel", Value::from(channel.clone()));
        }

        if !self.webhooks.is_empty() {
            insert_nested(&mut dict, "webhooks", "urls", Value::from(self.webhooks.clone()));
        }

        // A bare flag can only switch logging on; absence leaves lower layers alone.
        if self.log_metrics {
            insert_nested(&mut dict, "metrics", "log_metrics", Value::from(true));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}

fn insert_nested(dict: &mut Dict, section: &str, key: &str, value: Value) {
    let entry = dict
        .entry(section.to_string())
        .or_insert_with(|| Value::from(Dict::new()));
    if let Value::Dict(_, inner) = entry {
        inner.insert(key.to_string(), value);
    }
}
