//! `users`: organization members (`/api/v2/users`).

use super::contract::{Connection, ResourceTypeConfig};
use super::rest::{RestResource, DEFAULT_PAGE_SIZE};

const EXCLUDED: &[&str] = &[
    "id",
    "attributes.created_at",
    "attributes.modified_at",
    "attributes.status",
    "attributes.verified",
    "attributes.service_account",
    "attributes.disabled",
    "attributes.icon",
    "attributes.handle",
    "relationships.org",
];

const CONNECTIONS: &[Connection] = &[Connection::new("relationships.roles.data.id", "roles")];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("users", "/api/v2/users")
    .excluded(EXCLUDED)
    .connections(CONNECTIONS);

/// Builds the resource type.
///
/// Disabled users are not carried over.
#[must_use]
pub fn resource() -> RestResource {
    RestResource::json_api(CONFIG)
        .paginated(DEFAULT_PAGE_SIZE)
        .list_filter(|user| {
            !user
                .pointer("/attributes/disabled")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false)
        })
}
