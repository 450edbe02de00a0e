//! Type-level dependency order.
//!
//! Types form a directed graph through their connections. Strongly connected
//! components become apply groups: a group only starts once every group it
//! depends on has finished, and members of a cycle are applied together.

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::resources::ResourceRegistry;

/// Groups `selected` into apply groups, dependencies first.
///
/// Connections to types outside the selection are ignored; their
/// destination state is only read during reference resolution.
#[must_use]
pub fn dependency_groups(registry: &ResourceRegistry, selected: &[String]) -> Vec<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for ty in selected {
        graph.add_node(ty.as_str());
    }

    // Edges run from the referenced type to the referencing one.
    for ty in selected {
        let Some(config) = registry.config(ty) else {
            continue;
        };
        for target in config.targets() {
            if graph.contains_node(target) {
                graph.add_edge(target, ty.as_str(), ());
            }
        }
    }

    // Tarjan yields components in reverse topological order.
    tarjan_scc(&graph)
        .into_iter()
        .rev()
        .map(|component| {
            let mut group: Vec<String> = component.into_iter().map(str::to_string).collect();
            group.sort_unstable();
            group
        })
        .collect()
}

/// Flattens groups into one ordered list of types.
#[must_use]
pub fn flatten(groups: &[Vec<String>]) -> Vec<String> {
    groups.iter().flatten().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(groups: &[Vec<String>], ty: &str) -> usize {
        groups
            .iter()
            .position(|g| g.iter().any(|t| t == ty))
            .expect("type is grouped")
    }

    fn select(types: &[&str]) -> Vec<String> {
        types.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn test_dependencies_come_first() {
        let registry = ResourceRegistry::with_defaults();
        let groups = dependency_groups(&registry, &select(&["dashboards", "monitors", "roles", "service_level_objectives"]));

        assert!(position(&groups, "roles") < position(&groups, "monitors"));
        assert!(position(&groups, "monitors") < position(&groups, "service_level_objectives"));
        assert!(position(&groups, "service_level_objectives") < position(&groups, "dashboards"));
        assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), 4);
    }

    #[test]
    fn test_mutual_cycle_forms_one_group() {
        let registry = ResourceRegistry::with_defaults();
        let groups = dependency_groups(
            &registry,
            &select(&["synthetics_tests", "synthetics_global_variables", "synthetics_private_locations", "roles"]),
        );

        let cycle = &groups[position(&groups, "synthetics_tests")];
        assert_eq!(cycle, &select(&["synthetics_global_variables", "synthetics_tests"]));
        assert!(position(&groups, "synthetics_private_locations") < position(&groups, "synthetics_tests"));
        assert!(position(&groups, "roles") < position(&groups, "synthetics_tests"));
    }

    #[test]
    fn test_self_reference_is_a_single_group() {
        let registry = ResourceRegistry::with_defaults();
        let groups = dependency_groups(&registry, &select(&["synthetics_tests"]));
        assert_eq!(groups, vec![select(&["synthetics_tests"])]);
    }

    #[test]
    fn test_unselected_targets_are_ignored() {
        let registry = ResourceRegistry::with_defaults();
        let groups = dependency_groups(&registry, &select(&["users"]));
        assert_eq!(flatten(&groups), select(&["users"]));
    }
}
