//! `dashboard_lists`: manual dashboard lists (`/api/v1/dashboard/lists/manual`).

use super::contract::ResourceTypeConfig;
use super::rest::RestResource;

const EXCLUDED: &[&str] = &[
    "id",
    "type",
    "author",
    "created",
    "modified",
    "dashboard_count",
    "is_favorite",
    "is_shared",
];

/// Type config.
pub const CONFIG: ResourceTypeConfig =
    ResourceTypeConfig::new("dashboard_lists", "/api/v1/dashboard/lists/manual").excluded(EXCLUDED);

/// Builds the resource type.
#[must_use]
pub const fn resource() -> RestResource {
    RestResource::new(CONFIG).list_key("dashboard_lists")
}
