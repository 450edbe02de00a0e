//! Resource types.
//!
//! Each submodule describes one Datadog resource type: where it lives in the
//! API, which fields are server-managed, and which other types it references.
//! Most are plain [`RestResource`] collections; the rest implement
//! [`ResourceType`] directly.

mod contract;
mod registry;
mod rest;

pub mod dashboard_lists;
pub mod dashboards;
pub mod downtime_schedules;
pub mod downtimes;
pub mod logs_custom_pipelines;
pub mod logs_metrics;
pub mod logs_pipelines;
pub mod metric_tag_configurations;
pub mod monitors;
pub mod roles;
pub mod service_level_objectives;
pub mod synthetics_global_variables;
pub mod synthetics_private_locations;
pub mod synthetics_tests;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use contract::{
    default_connect_id, for_each_scalar, rewrite_id, ConnectContext, Connection, ResourceType,
    ResourceTypeConfig,
};
pub use registry::ResourceRegistry;
pub use rest::{ConnectFn, RestResource, UpdateVerb, DEFAULT_PAGE_SIZE};
