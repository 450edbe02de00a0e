//! Lookup table of resource types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::contract::{ResourceType, ResourceTypeConfig};
use super::{
    dashboard_lists, dashboards, downtime_schedules, downtimes, logs_custom_pipelines, logs_metrics,
    logs_pipelines, metric_tag_configurations, monitors, roles, service_level_objectives, synthetics_global_variables,
    synthetics_private_locations, synthetics_tests, users,
};

/// Every resource type known to a run, keyed by type name.
#[derive(Clone, Default)]
pub struct ResourceRegistry {
    types: BTreeMap<&'static str, Arc<dyn ResourceType>>,
}

impl fmt::Debug for ResourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types.keys()).finish()
    }
}

impl ResourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in type.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(roles::resource()));
        registry.register(Arc::new(users::resource()));
        registry.register(Arc::new(monitors::resource()));
        registry.register(Arc::new(downtimes::resource()));
        registry.register(Arc::new(downtime_schedules::resource()));
        registry.register(Arc::new(service_level_objectives::resource()));
        registry.register(Arc::new(dashboards::resource()));
        registry.register(Arc::new(dashboard_lists::resource()));
        registry.register(Arc::new(logs_custom_pipelines::resource()));
        registry.register(Arc::new(logs_pipelines::LogsPipelines::new()));
        registry.register(Arc::new(logs_metrics::resource()));
        registry.register(Arc::new(metric_tag_configurations::MetricTagConfigurations::new()));
        registry.register(Arc::new(synthetics_private_locations::SyntheticsPrivateLocations::new()));
        registry.register(Arc::new(synthetics_global_variables::resource()));
        registry.register(Arc::new(synthetics_tests::SyntheticsTests::new()));
        registry
    }

    /// Adds or replaces a type.
    pub fn register(&mut self, resource: Arc<dyn ResourceType>) {
        self.types.insert(resource.name(), resource);
    }

    /// Returns a type by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ResourceType>> {
        self.types.get(name)
    }

    /// Returns true if the type is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns the config of a type.
    #[must_use]
    pub fn config(&self, name: &str) -> Option<&ResourceTypeConfig> {
        self.types.get(name).map(|t| t.config())
    }

    /// Returns every type name, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.types.keys().copied().collect()
    }

    /// Returns `(legacy, replacement)` for every type that supersedes another.
    #[must_use]
    pub fn superseded_pairs(&self) -> Vec<(&'static str, &'static str)> {
        self.types
            .values()
            .filter_map(|t| t.config().supersedes.map(|legacy| (legacy, t.name())))
            .collect()
    }
}
