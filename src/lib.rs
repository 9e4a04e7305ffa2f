/// release-relay - relays release note diffs from a pub/sub channel to chat webhooks
///
/// Events published on the update channel are formatted into categorized
/// `diff` blocks and posted independently to every configured webhook.
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod formatting;
pub mod internal_metrics;
pub mod network;
pub mod notification;
pub mod task_manager;

// Re-export core types for convenience
pub use crate::core::*;
