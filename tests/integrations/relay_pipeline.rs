//! End-to-end tests: raw channel message in, webhook request out.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{
    app::TestAppBuilder,
    release_event,
    webhook_server::{endpoint_for, json_body, start_webhook, wait_for_requests},
};
use serde_json::json;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_release_event_is_posted_to_webhook() {
    // Arrange
    let server = start_webhook(204).await;
    let app = TestAppBuilder::new()
        .with_endpoint(endpoint_for("DISCORD_WEBHOOK", &server))
        .start()
        .await
        .expect("app starts");

    // Act
    app.publish_json(json!({
        "release": 640,
        "diffs": {
            "added": [{"type": "Improvements", "status": "Pending", "content": "<b>Faster</b> startup"}],
            "removed": [{"type": "Fixes", "status": "Live", "content": "Old fix"}],
            "modified": [{"type": "Fixes", "oldStatus": "Pending", "value": {"type": "Fixes", "status": "Live", "content": "Crash on <i>join</i>"}}]
        }
    }));

    // Assert
    let requests = wait_for_requests(&server, 1, WAIT).await;
    let body = json_body(&requests[0]);

    assert_eq!(body["username"], "RBX Release Tracker");
    assert_eq!(body["flags"], 4096);
    assert_eq!(body["content"], serde_json::Value::Null);
    assert_eq!(body["embeds"][0]["title"], "** Release 640**");
    assert!(body["embeds"][0]["description"]
        .as_str()
        .unwrap()
        .ends_with("docs/release-640.md)"));
    assert_eq!(
        body["embeds"][0]["fields"],
        json!([
            {"name": "Improvements", "value": "```diff\n+ [Pending] Faster startup\n```"},
            {"name": "Fixes", "value": "```diff\n* [Pending -> Live] Crash on join\n- [Live] Old fix\n```"}
        ])
    );

    app.shutdown(WAIT).await.expect("clean shutdown");
}

#[tokio::test]
async fn test_malformed_message_is_skipped_and_listener_keeps_running() {
    // Arrange
    let server = start_webhook(200).await;
    let app = TestAppBuilder::new()
        .with_endpoint(endpoint_for("DISCORD_WEBHOOK", &server))
        .start()
        .await
        .expect("app starts");

    // Act
    app.publish("this is not json");
    app.publish_json(json!({"release": "1"}));
    app.publish_json(release_event(json!("2"), &[("Fixes", "Live", "Fixed crash")]));

    // Assert
    let requests = wait_for_requests(&server, 1, WAIT).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(json_body(&requests[0])["embeds"][0]["title"], "** Release 2**");

    app.shutdown(WAIT).await.expect("clean shutdown");
}

#[tokio::test]
async fn test_event_without_relayed_categories_sends_nothing() {
    // Arrange
    let server = start_webhook(200).await;
    let app = TestAppBuilder::new()
        .with_endpoint(endpoint_for("DISCORD_WEBHOOK", &server))
        .start()
        .await
        .expect("app starts");

    // Act
    app.publish_json(release_event(json!("3"), &[("Other", "Live", "Not relayed")]));
    // A later event proves the first one has been fully processed.
    app.publish_json(release_event(json!("4"), &[("Improvements", "Live", "Relayed")]));

    // Assert
    let requests = wait_for_requests(&server, 1, WAIT).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let requests_after = server.received_requests().await.unwrap_or_default();

    assert_eq!(json_body(&requests[0])["embeds"][0]["title"], "** Release 4**");
    assert_eq!(requests_after.len(), 1);

    app.shutdown(WAIT).await.expect("clean shutdown");
}

#[tokio::test]
async fn test_every_endpoint_receives_each_event() {
    // Arrange
    let first = start_webhook(204).await;
    let second = start_webhook(204).await;
    let app = TestAppBuilder::new()
        .with_endpoint(endpoint_for("DISCORD_WEBHOOK_A", &first))
        .with_endpoint(endpoint_for("DISCORD_WEBHOOK_B", &second))
        .start()
        .await
        .expect("app starts");

    // Act
    app.publish_json(release_event(json!(5), &[("Fixes", "Live", "one")]));
    app.publish_json(release_event(json!(6), &[("Fixes", "Live", "two")]));

    // Assert
    assert_eq!(wait_for_requests(&first, 2, WAIT).await.len(), 2);
    assert_eq!(wait_for_requests(&second, 2, WAIT).await.len(), 2);

    app.shutdown(WAIT).await.expect("clean shutdown");
}

#[tokio::test]
async fn test_custom_embed_settings_are_applied() {
    // Arrange
    let server = start_webhook(204).await;
    let app = TestAppBuilder::new()
        .with_endpoint(endpoint_for("DISCORD_WEBHOOK", &server))
        .with_config_modifier(|config| {
            config.embed.username = "Release Bot".to_string();
            config.embed.silent = false;
            config.embed.description_template = "Notes for {release}".to_string();
        })
        .start()
        .await
        .expect("app starts");

    // Act
    app.publish_json(release_event(json!("7"), &[("Improvements", "Live", "x")]));

    // Assert
    let requests = wait_for_requests(&server, 1, WAIT).await;
    let body = json_body(&requests[0]);
    assert_eq!(body["username"], "Release Bot");
    assert_eq!(body["flags"], 0);
    assert_eq!(body["embeds"][0]["description"], "Notes for 7");

    app.shutdown(WAIT).await.expect("clean shutdown");
}

#[tokio::test]
async fn test_app_shuts_down_promptly_after_subscription_ends() {
    // Arrange
    let server = start_webhook(204).await;
    let mut app = TestAppBuilder::new()
        .with_endpoint(endpoint_for("DISCORD_WEBHOOK", &server))
        .start()
        .await
        .expect("app starts");
    app.publish_json(release_event(json!("8"), &[("Fixes", "Live", "last")]));
    wait_for_requests(&server, 1, WAIT).await;

    // Act
    app.close_channel();

    // Assert
    app.shutdown(Duration::from_secs(1))
        .await
        .expect("app stops within a second");
}

#[tokio::test]
async fn test_incomplete_unrelayed_entry_does_not_block_delivery() {
    // Arrange
    let server = start_webhook(204).await;
    let app = TestAppBuilder::new()
        .with_endpoint(endpoint_for("DISCORD_WEBHOOK", &server))
        .start()
        .await
        .expect("app starts");

    // Act
    app.publish_json(json!({
        "release": "9",
        "diffs": {
            "added": [
                {"type": "Fixes", "status": "Live", "content": "Fixed crash"},
                {"type": "Announcements", "content": null}
            ],
            "removed": [],
            "modified": []
        }
    }));

    // Assert
    let requests = wait_for_requests(&server, 1, WAIT).await;
    assert_eq!(
        json_body(&requests[0])["embeds"][0]["fields"],
        json!([{"name": "Fixes", "value": "```diff\n+ [Live] Fixed crash\n```"}])
    );

    app.shutdown(WAIT).await.expect("clean shutdown");
}
