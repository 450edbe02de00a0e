//! `roles`: access roles (`/api/v2/roles`).

use super::contract::ResourceTypeConfig;
use super::rest::{RestResource, DEFAULT_PAGE_SIZE};

const EXCLUDED: &[&str] = &[
    "id",
    "attributes.created_at",
    "attributes.modified_at",
    "attributes.user_count",
    "relationships.users",
];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("roles", "/api/v2/roles").excluded(EXCLUDED);

/// Builds the resource type.
#[must_use]
pub const fn resource() -> RestResource {
    RestResource::json_api(CONFIG).paginated(DEFAULT_PAGE_SIZE)
}
