//! Core domain types for release-relay
//!
//! This module defines the release diff data model as it arrives from the
//! pub/sub channel, plus the `Endpoint` type that identifies a webhook target.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A single release note entry.
///
/// Missing or `null` fields decode as empty strings. Only entries in relayed
/// categories are ever read, so an incomplete entry elsewhere must not reject
/// the whole event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ChangeEntry {
    /// The category tag, e.g. "Improvements" or "Fixes".
    #[serde(rename = "type", default, deserialize_with = "null_as_empty")]
    pub category: String,
    /// The rollout status of the entry, e.g. "Live" or "Pending".
    #[serde(default, deserialize_with = "null_as_empty")]
    pub status: String,
    /// The note text. May contain HTML-like markup.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

/// An entry whose status changed between two revisions of the notes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ModifiedEntry {
    /// The status before the change. The new status is `value.status`.
    #[serde(rename = "oldStatus", default, deserialize_with = "null_as_empty")]
    pub old_status: String,
    #[serde(default)]
    pub value: ChangeEntry,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The set of changes carried by one event. Sequence order is significant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DiffSet {
    #[serde(default)]
    pub added: Vec<ChangeEntry>,
    #[serde(default)]
    pub removed: Vec<ChangeEntry>,
    #[serde(default)]
    pub modified: Vec<ModifiedEntry>,
}

/// Largest float that still represents every integer below it exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Identifier of a release. Publishers send either a string or a number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ReleaseId {
    Number(serde_json::Number),
    Text(String),
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Integral floats print without a fraction, so `1.0` renders as `1`.
            ReleaseId::Number(n) => match n.as_f64() {
                Some(v) if n.is_f64() && v.fract() == 0.0 && v.abs() < MAX_SAFE_INTEGER => {
                    write!(f, "{}", v as i64)
                }
                _ => write!(f, "{}", n),
            },
            ReleaseId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ReleaseId {
    fn from(value: &str) -> Self {
        ReleaseId::Text(value.to_string())
    }
}

impl From<u64> for ReleaseId {
    fn from(value: u64) -> Self {
        ReleaseId::Number(value.into())
    }
}

/// A release notes diff event, as published on the update channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReleaseEvent {
    pub release: ReleaseId,
    pub diffs: DiffSet,
}

/// An outbound webhook target.
///
/// Webhook URLs embed their credentials, so `Display` and `Debug` only show
/// the name the endpoint was configured under.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    url: String,
}

impl Endpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// The configuration key this endpoint was loaded from.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
