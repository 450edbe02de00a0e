//! `monitors` (`/api/v1/monitor`).
//!
//! Monitors owned by synthetic tests are created together with their test,
//! so they are left out of the listing.

use serde_json::Value;

use super::contract::{Connection, ResourceTypeConfig};
use super::rest::RestResource;

const EXCLUDED: &[&str] = &[
    "id",
    "matching_downtimes",
    "creator",
    "created",
    "created_at",
    "modified",
    "deleted",
    "org_id",
    "overall_state",
    "overall_state_modified",
];

const CONNECTIONS: &[Connection] = &[Connection::new("restricted_roles", "roles")];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("monitors", "/api/v1/monitor")
    .excluded(EXCLUDED)
    .connections(CONNECTIONS)
    .tagging("tags");

fn is_user_managed(monitor: &Value) -> bool {
    monitor.get("type").and_then(Value::as_str) != Some("synthetics alert")
}

/// Builds the resource type.
#[must_use]
pub fn resource() -> RestResource {
    RestResource::new(CONFIG).list_filter(is_user_managed)
}
