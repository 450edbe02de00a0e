//! `logs_custom_pipelines`: legacy view of user-defined log pipelines.
//!
//! Superseded by [`super::logs_pipelines`], which also handles integration
//! pipelines.

use serde_json::Value;

use super::contract::ResourceTypeConfig;
use super::rest::RestResource;

const EXCLUDED: &[&str] = &["id", "type", "is_read_only"];

/// Type config.
pub const CONFIG: ResourceTypeConfig =
    ResourceTypeConfig::new("logs_custom_pipelines", "/api/v1/logs/config/pipelines").excluded(EXCLUDED);

/// Builds the resource type.
#[must_use]
pub fn resource() -> RestResource {
    RestResource::new(CONFIG)
        .list_filter(|p| !p.get("is_read_only").and_then(Value::as_bool).unwrap_or(false))
}
