//! `downtimes`: legacy v1 downtimes (`/api/v1/downtime`).
//!
//! Superseded by [`super::downtime_schedules`].

use serde_json::Value;

use super::contract::{Connection, ResourceTypeConfig};
use super::rest::RestResource;

const EXCLUDED: &[&str] = &[
    "id",
    "creator_id",
    "updater_id",
    "created",
    "modified",
    "disabled",
    "active",
    "active_child",
    "parent_id",
    "child_id",
    "uuid",
];

const CONNECTIONS: &[Connection] = &[Connection::new("monitor_id", "monitors")];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("downtimes", "/api/v1/downtime")
    .excluded(EXCLUDED)
    .connections(CONNECTIONS);

/// Builds the resource type. Canceled downtimes are skipped.
#[must_use]
pub fn resource() -> RestResource {
    RestResource::new(CONFIG).list_filter(|d| d.get("canceled").is_none_or(Value::is_null))
}
