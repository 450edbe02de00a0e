//! `downtime_schedules`: v2 downtimes (`/api/v2/downtime`).

use super::contract::{Connection, ResourceTypeConfig};
use super::rest::RestResource;

const EXCLUDED: &[&str] = &[
    "id",
    "attributes.created",
    "attributes.modified",
    "attributes.status",
    "relationships",
];

const CONNECTIONS: &[Connection] =
    &[Connection::new("attributes.monitor_identifier.monitor_id", "monitors")];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("downtime_schedules", "/api/v2/downtime")
    .excluded(EXCLUDED)
    .connections(CONNECTIONS)
    .supersedes("downtimes");

/// Builds the resource type. Canceled schedules are skipped.
#[must_use]
pub fn resource() -> RestResource {
    RestResource::json_api(CONFIG).list_filter(|d| {
        d.pointer("/attributes/canceled").is_none_or(serde_json::Value::is_null)
    })
}
