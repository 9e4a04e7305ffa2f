//! Configuration loading: file discovery, environment layering and endpoint discovery.

use clap::Parser;
use figment::Jail;
use release_relay::cli::Cli;
use release_relay::config::{Config, ConfigError, DEFAULT_CONFIG_FILE};

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["release-relay"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("valid args")
}

#[test]
fn test_defaults_without_any_source() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        let config = Config::load_from_cli(parse(&[])).expect("config loads");

        assert_eq!(config, Config::default());
        assert_eq!(config.transport.channel, "update");
        assert_eq!(config.webhooks.env_prefix, "DISCORD_WEBHOOK");
        assert!(config.request_timeout().is_none());
        Ok(())
    });
}

#[test]
fn test_default_config_file_is_discovered() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.create_file(
            DEFAULT_CONFIG_FILE,
            r#"
            [transport]
            url = "redis://file:6379"

            [webhooks]
            urls = ["https://discord.test/api/webhooks/1/abc"]
            request_timeout_seconds = 10

            [metrics]
            log_metrics = true
            "#,
        )?;

        let config = Config::load_from_cli(parse(&[])).expect("config loads");

        assert_eq!(config.transport.url.as_deref(), Some("redis://file:6379"));
        assert_eq!(config.request_timeout(), Some(std::time::Duration::from_secs(10)));
        assert!(config.metrics.log_metrics);

        let endpoints = config.endpoints(Vec::new());
        assert_eq!(endpoints.len(), 1);
        assert_eq!(config.validate(&endpoints), Ok(()));
        Ok(())
    });
}

#[test]
fn test_cli_flags_override_environment() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("REDIS_URL", "redis://env:6379");
        jail.set_env("RELAY_TRANSPORT__CHANNEL", "env-channel");

        let config = Config::load_from_cli(parse(&[
            "--redis-url",
            "redis://cli:6379",
            "--channel",
            "cli-channel",
            "--webhook",
            "https://discord.test/api/webhooks/2/def",
            "--log-metrics",
        ]))
        .expect("config loads");

        assert_eq!(config.transport.url.as_deref(), Some("redis://cli:6379"));
        assert_eq!(config.transport.channel, "cli-channel");
        assert_eq!(config.webhooks.urls, vec!["https://discord.test/api/webhooks/2/def"]);
        assert!(config.metrics.log_metrics);
        Ok(())
    });
}

#[test]
fn test_webhooks_discovered_from_environment() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("REDIS_URL", "redis://env:6379");
        jail.set_env("DISCORD_WEBHOOK", "https://discord.test/api/webhooks/1/main");
        jail.set_env("DISCORD_WEBHOOK_BACKUP", "https://discord.test/api/webhooks/2/backup");

        let config = Config::load_from_cli(parse(&[])).expect("config loads");
        let endpoints = config.endpoints_from_env();

        let names: Vec<&str> = endpoints.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["DISCORD_WEBHOOK", "DISCORD_WEBHOOK_BACKUP"]);
        assert_eq!(config.validate(&endpoints), Ok(()));
        Ok(())
    });
}

#[test]
fn test_custom_env_prefix() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("RELAY_WEBHOOKS__ENV_PREFIX", "RELEASE_HOOK");
        jail.set_env("RELEASE_HOOK_1", "https://discord.test/api/webhooks/3/ghi");

        let config = Config::load_from_cli(parse(&[])).expect("config loads");
        let endpoints = config.endpoints_from_env();

        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].name(), "RELEASE_HOOK_1");
        assert_eq!(config.validate(&endpoints), Err(ConfigError::MissingTransportUrl));
        Ok(())
    });
}

#[test]
fn test_invalid_toml_is_reported() {
    Jail::expect_with(|jail| {
        jail.clear_env();
        jail.create_file("broken.toml", "[transport\nurl = ")?;

        let result = Config::load_from_cli(parse(&["--config", "broken.toml"]));
        assert!(result.is_err());
        Ok(())
    });
}
