//! Delivery of formatted release notes to webhook endpoints.
//!
//! `discord` builds the payload for an event, `webhook` posts it, and
//! `dispatcher` runs one independent delivery per configured endpoint.
pub mod discord;
pub mod dispatcher;
pub mod webhook;

pub use dispatcher::{DeliveryOutcome, Dispatcher};
pub use webhook::{DeliveryError, HttpWebhookClient, WebhookClient};
