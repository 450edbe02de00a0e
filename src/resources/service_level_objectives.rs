//! `service_level_objectives` (`/api/v1/slo`).

use super::contract::{Connection, ResourceTypeConfig};
use super::rest::RestResource;

const EXCLUDED: &[&str] = &["id", "creator", "created_at", "modified_at"];

const CONNECTIONS: &[Connection] = &[Connection::new("monitor_ids", "monitors")];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("service_level_objectives", "/api/v1/slo")
    .excluded(EXCLUDED)
    .connections(CONNECTIONS)
    .tagging("tags");

/// Builds the resource type.
#[must_use]
pub const fn resource() -> RestResource {
    RestResource::new(CONFIG).list_key("data")
}
