//! `synthetics_global_variables` (`/api/v1/synthetics/variables`).
//!
//! Variables extracted from a test reference it by bare public id, which is a
//! prefix of the test's composite state key.

use serde_json::{Map, Value};

use super::contract::{ConnectContext, Connection, ResourceTypeConfig};
use super::rest::RestResource;
use super::synthetics_tests;

const EXCLUDED: &[&str] = &["id", "created_at", "modified_at", "creator", "last_error"];

const CONNECTIONS: &[Connection] = &[
    Connection::new("parse_test_public_id", "synthetics_tests"),
    Connection::new("attributes.restricted_roles", "roles"),
];

/// Type config.
pub const CONFIG: ResourceTypeConfig =
    ResourceTypeConfig::new("synthetics_global_variables", "/api/v1/synthetics/variables")
        .excluded(EXCLUDED)
        .connections(CONNECTIONS)
        .tagging("tags");

fn connect(key: &str, parent: &mut Map<String, Value>, target: &str, ctx: &ConnectContext<'_>) -> Option<Vec<String>> {
    (target == synthetics_tests::CONFIG.resource_type)
        .then(|| synthetics_tests::connect_test_public_id(key, parent, ctx))
}

/// Builds the resource type.
#[must_use]
pub const fn resource() -> RestResource {
    RestResource::new(CONFIG).list_key("variables").connect_with(connect)
}
