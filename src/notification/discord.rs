//! Discord-style webhook payloads.

use crate::config::EmbedConfig;
use crate::core::ReleaseEvent;
use crate::formatting::{code_block, format_diff, CategoryBuckets};
use serde::{Deserialize, Serialize};

/// `flags` bit that suppresses push and desktop notifications.
pub const SUPPRESS_NOTIFICATIONS: u32 = 1 << 12;

/// The JSON body posted to a webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookPayload {
    /// Always serialized, as `null` when there is no plain-text content.
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub username: String,
    pub avatar_url: String,
    pub attachments: Vec<serde_json::Value>,
    pub flags: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

/// One field per non-empty category, each holding a `diff` code block.
pub fn build_fields(buckets: &CategoryBuckets) -> Vec<EmbedField> {
    buckets
        .non_empty()
        .map(|(category, lines)| EmbedField {
            name: category.to_string(),
            value: code_block("diff", &lines.join("\n")),
        })
        .collect()
}

/// Formats `event` into a webhook payload.
///
/// Returns `None` when no relayed category has any line, in which case there
/// is nothing to post.
pub fn build_payload(event: &ReleaseEvent, embed: &EmbedConfig) -> Option<WebhookPayload> {
    let buckets = format_diff(&event.diffs);
    if buckets.is_empty() {
        return None;
    }

    let release = event.release.to_string();
    Some(WebhookPayload {
        content: None,
        embeds: vec![Embed {
            title: format!("** Release {}**", release),
            description: embed.description_template.replace("{release}", &release),
            color: embed.color,
            fields: build_fields(&buckets),
        }],
        username: embed.username.clone(),
        avatar_url: embed.avatar_url.clone(),
        attachments: Vec::new(),
        flags: if embed.silent { SUPPRESS_NOTIFICATIONS } else { 0 },
    })
}
