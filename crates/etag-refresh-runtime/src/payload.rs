//! Data embedded into the client program.
//!
//! Field names are camelCase because the payload is read by JavaScript.

use serde::{Deserialize, Serialize};

/// Active polling options for one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeOptions {
    /// Resource whose ETag is watched (absolute URL or path)
    pub resource: String,
    /// Polling interval in milliseconds
    pub interval: u64,
    /// Suppress console output and the visible notification
    pub quiet: bool,
}

/// Pre-serialized notification presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    /// CSS text applied to the notification container
    pub container_css: String,
    /// CSS text applied to the refresh button
    pub button_css: String,
    /// Inner HTML of the notification
    pub template: String,
}

/// Everything the client program needs, serialized once at generation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPayload {
    pub options: RuntimeOptions,
    pub notification: NotificationPayload,
    pub version: String,
}
