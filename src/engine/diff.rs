//! Diff engine for comparing source and destination resources.
//!
//! Source bodies are transformed exactly as they would be for an apply
//! (references resolved, excluded attributes stripped, sync tag added) and
//! then compared field by field with the destination bodies.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::body::remove_path;
use crate::config::CleanupPolicy;
use crate::filter::FilterSet;
use crate::resources::{ConnectContext, ResourceRegistry};
use crate::state::{Origin, State};

use super::resolver::{prepare_body, UnresolvedReference};

/// Kind of a field-level change, seen from the source side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present in the source only.
    Added,
    /// Present in the destination only.
    Removed,
    /// Present on both sides with different values.
    Changed,
}

/// One differing field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    /// Path of the field, e.g. `options.thresholds.critical` or `tags[1]`.
    pub path: String,
    /// Kind of change.
    pub kind: ChangeKind,
    /// Destination value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    /// Source value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

/// What a resource needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    /// No destination counterpart yet.
    Create,
    /// The destination counterpart differs.
    Update,
    /// The destination resource has no source counterpart.
    Delete,
}

/// Difference for a single resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDiff {
    /// Resource type.
    pub resource_type: String,
    /// State key.
    pub id: String,
    /// Type of difference.
    pub diff_type: DiffType,
    /// Field-level changes, for updates.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
    /// References that could not be resolved while preparing the body.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedReference>,
}

/// Complete diff result.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    /// All resource diffs.
    pub diffs: Vec<ResourceDiff>,
    /// Number of resources to create.
    pub creates: usize,
    /// Number of resources to update.
    pub updates: usize,
    /// Number of resources to delete.
    pub deletes: usize,
}

impl DiffReport {
    /// Returns true if anything differs.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.diffs.is_empty()
    }

    fn push(&mut self, diff: ResourceDiff) {
        match diff.diff_type {
            DiffType::Create => self.creates += 1,
            DiffType::Update => self.updates += 1,
            DiffType::Delete => self.deletes += 1,
        }
        self.diffs.push(diff);
    }
}

/// Removes every excluded attribute path from a body.
pub fn strip_excluded(body: &mut Value, excluded: &[&str]) {
    for path in excluded {
        remove_path(body, path);
    }
}

/// Compares two bodies after stripping `excluded` from both.
#[must_use]
pub fn diff_bodies(desired: &Value, current: &Value, excluded: &[&str]) -> Vec<FieldChange> {
    let mut desired = desired.clone();
    let mut current = current.clone();
    strip_excluded(&mut desired, excluded);
    strip_excluded(&mut current, excluded);

    let mut changes = Vec::new();
    compare("", &desired, &current, &mut changes);
    changes
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn compare(path: &str, new: &Value, old: &Value, changes: &mut Vec<FieldChange>) {
    match (new, old) {
        (Value::Object(new_map), Value::Object(old_map)) => {
            for (key, new_value) in new_map {
                let field = join(path, key);
                match old_map.get(key) {
                    Some(old_value) => compare(&field, new_value, old_value, changes),
                    None => changes.push(FieldChange {
                        path: field,
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(new_value.clone()),
                    }),
                }
            }
            for (key, old_value) in old_map {
                if !new_map.contains_key(key) {
                    changes.push(FieldChange {
                        path: join(path, key),
                        kind: ChangeKind::Removed,
                        old: Some(old_value.clone()),
                        new: None,
                    });
                }
            }
        }
        (Value::Array(new_items), Value::Array(old_items)) => {
            for index in 0..new_items.len().max(old_items.len()) {
                let field = format!("{path}[{index}]");
                match (new_items.get(index), old_items.get(index)) {
                    (Some(n), Some(o)) => compare(&field, n, o, changes),
                    (Some(n), None) => changes.push(FieldChange {
                        path: field,
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(n.clone()),
                    }),
                    (None, Some(o)) => changes.push(FieldChange {
                        path: field,
                        kind: ChangeKind::Removed,
                        old: Some(o.clone()),
                        new: None,
                    }),
                    (None, None) => {}
                }
            }
        }
        _ if new == old => {}
        _ => changes.push(FieldChange {
            path: path.to_string(),
            kind: ChangeKind::Changed,
            old: Some(old.clone()),
            new: Some(new.clone()),
        }),
    }
}

/// Engine for computing diffs between source and destination state.
#[derive(Debug)]
pub struct DiffEngine<'a> {
    registry: &'a ResourceRegistry,
    filters: &'a FilterSet,
    sync_tag: Option<&'a str>,
}

impl<'a> DiffEngine<'a> {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new(registry: &'a ResourceRegistry, filters: &'a FilterSet, sync_tag: Option<&'a str>) -> Self {
        Self {
            registry,
            filters,
            sync_tag,
        }
    }

    /// Computes the diff of `types` without touching the state.
    #[must_use]
    pub fn compute(&self, state: &State, types: &[String], cleanup: CleanupPolicy) -> DiffReport {
        let mut report = DiffReport::default();
        let ctx = ConnectContext::new(state, self.registry);

        for ty in types {
            let Some(resource) = self.registry.get(ty) else {
                continue;
            };
            let excluded = resource.config().excluded_attributes;
            let Some(source) = state.map(Origin::Source, ty) else {
                continue;
            };

            for (id, source_body) in source {
                if !self.filters.is_match(ty, source_body) {
                    continue;
                }

                let (desired, unresolved) = prepare_body(resource.as_ref(), source_body, &ctx, self.sync_tag);

                match state.get(Origin::Destination, ty, id) {
                    Some(current) => {
                        let changes = diff_bodies(&desired, current, excluded);
                        if changes.is_empty() {
                            continue;
                        }
                        debug!("{ty} {id}: {} field(s) differ", changes.len());
                        report.push(ResourceDiff {
                            resource_type: ty.clone(),
                            id: id.clone(),
                            diff_type: DiffType::Update,
                            changes,
                            unresolved,
                        });
                    }
                    None => report.push(ResourceDiff {
                        resource_type: ty.clone(),
                        id: id.clone(),
                        diff_type: DiffType::Create,
                        changes: Vec::new(),
                        unresolved,
                    }),
                }
            }
        }

        if cleanup != CleanupPolicy::Off {
            for (ty, id) in state.resources_to_cleanup(types) {
                report.push(ResourceDiff {
                    resource_type: ty,
                    id,
                    diff_type: DiffType::Delete,
                    changes: Vec::new(),
                    unresolved: Vec::new(),
                });
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOperator;
    use serde_json::json;

    #[test]
    fn test_excluded_attributes_do_not_count() {
        let desired = json!({"id": 1, "name": "cpu", "options": {"silenced": {"*": null}}});
        let current = json!({"id": 900, "name": "cpu", "options": {"silenced": {}}, "created": "now"});

        let changes = diff_bodies(&desired, &current, &["id", "options.silenced", "created"]);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_field_changes_are_reported_with_paths() {
        let desired = json!({"name": "cpu", "tags": ["a", "b"], "options": {"thresholds": {"critical": 90}}});
        let current = json!({"name": "cpu", "tags": ["a"], "options": {"thresholds": {"critical": 80}}, "extra": true});

        let changes = diff_bodies(&desired, &current, &[]);
        let summary: Vec<(&str, ChangeKind)> = changes.iter().map(|c| (c.path.as_str(), c.kind)).collect();

        assert!(summary.contains(&("tags[1]", ChangeKind::Added)));
        assert!(summary.contains(&("options.thresholds.critical", ChangeKind::Changed)));
        assert!(summary.contains(&("extra", ChangeKind::Removed)));
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_report_counts_creates_updates_and_deletes() {
        let registry = ResourceRegistry::with_defaults();
        let filters = FilterSet::parse::<&str>(&[], FilterOperator::Or).expect("filters");
        let engine = DiffEngine::new(&registry, &filters, None);

        let mut state = State::new();
        state.insert(Origin::Source, "roles", "same", json!({"id": "same", "attributes": {"name": "a"}}));
        state.insert(Origin::Destination, "roles", "same", json!({"id": "d1", "attributes": {"name": "a"}}));
        state.insert(Origin::Source, "roles", "changed", json!({"id": "changed", "attributes": {"name": "new"}}));
        state.insert(Origin::Destination, "roles", "changed", json!({"id": "d2", "attributes": {"name": "old"}}));
        state.insert(Origin::Source, "roles", "fresh", json!({"id": "fresh", "attributes": {"name": "c"}}));
        state.insert(Origin::Destination, "roles", "orphan", json!({"id": "d4", "attributes": {"name": "d"}}));

        let types = vec!["roles".to_string()];

        let report = engine.compute(&state, &types, CleanupPolicy::Off);
        assert_eq!((report.creates, report.updates, report.deletes), (1, 1, 0));

        let report = engine.compute(&state, &types, CleanupPolicy::Allow);
        assert_eq!((report.creates, report.updates, report.deletes), (1, 1, 1));
        assert!(report.has_changes());
    }

    #[test]
    fn test_filtered_out_resources_are_not_reported() {
        let registry = ResourceRegistry::with_defaults();
        let filters = FilterSet::parse(&["Type=roles;Name=attributes.name;Value=ops"], FilterOperator::Or)
            .expect("filters");
        let engine = DiffEngine::new(&registry, &filters, None);

        let mut state = State::new();
        state.insert(Origin::Source, "roles", "kept", json!({"id": "kept", "attributes": {"name": "ops"}}));
        state.insert(Origin::Source, "roles", "new", json!({"id": "new", "attributes": {"name": "dev"}}));
        state.insert(Origin::Source, "roles", "drifted", json!({"id": "drifted", "attributes": {"name": "qa"}}));
        state.insert(Origin::Destination, "roles", "drifted", json!({"id": "d1", "attributes": {"name": "old"}}));

        let report = engine.compute(&state, &["roles".to_string()], CleanupPolicy::Off);

        assert_eq!(report.creates, 1);
        assert_eq!(report.updates, 0);
        assert_eq!(report.diffs.len(), 1);
        assert_eq!(report.diffs[0].id, "kept");
    }
}
