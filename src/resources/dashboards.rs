//! `dashboards` (`/api/v1/dashboard`).
//!
//! The listing only returns summaries, so every dashboard is fetched again in
//! full when imported. Widgets reference monitors and SLOs; group widgets nest
//! one level of widgets.

use super::contract::{Connection, ResourceTypeConfig};
use super::rest::RestResource;

const EXCLUDED: &[&str] = &[
    "id",
    "author_handle",
    "author_name",
    "url",
    "created_at",
    "modified_at",
];

const CONNECTIONS: &[Connection] = &[
    Connection::new("widgets.definition.alert_id", "monitors"),
    Connection::new("widgets.definition.widgets.definition.alert_id", "monitors"),
    Connection::new("widgets.definition.slo_id", "service_level_objectives"),
    Connection::new("widgets.definition.widgets.definition.slo_id", "service_level_objectives"),
    Connection::new("restricted_roles", "roles"),
];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("dashboards", "/api/v1/dashboard")
    .excluded(EXCLUDED)
    .connections(CONNECTIONS);

/// Builds the resource type.
#[must_use]
pub const fn resource() -> RestResource {
    RestResource::new(CONFIG).list_key("dashboards").fetch_detail()
}
