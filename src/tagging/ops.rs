//! Rewrites over the resources of one type.
//!
//! Each operation edits a [`ResourceMap`] in place and returns how many
//! resources (or, for per-tag rewrites, how many tags) it changed. Bodies
//! without a `tags` array are left alone by the tag operations.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::resources::synthetics_tests::PRIVATE_LOCATION_ID;
use crate::state::ResourceMap;

use super::mapping::VariableSwap;

/// Tag Terraform puts on the resources it manages.
pub const TERRAFORM_TAG: &str = "created_by:terraform";

/// One week, in seconds.
pub const WEEKLY_TICK_SECS: u64 = 604_800;

/// A compiled tag rewrite.
#[derive(Debug, Clone)]
pub struct TagRewrite {
    /// Pattern a tag must match.
    pub pattern: Regex,
    /// Replacement, with `$1`-style group references.
    pub replacement: String,
}

fn tags_mut(body: &mut Value) -> Option<&mut Vec<Value>> {
    body.get_mut("tags").and_then(Value::as_array_mut)
}

fn has_tag(body: &Value, tag: &str) -> bool {
    body.get("tags")
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
}

/// Counts the resources that carry a `tags` field.
#[must_use]
pub fn count_tagged(resources: &ResourceMap) -> usize {
    resources.values().filter(|body| body.get("tags").is_some()).count()
}

/// Adds `tag` where it is missing.
pub fn add_tag(resources: &mut ResourceMap, tag: &str) -> usize {
    let mut count = 0;
    for tags in resources.values_mut().filter_map(tags_mut) {
        if !tags.iter().any(|t| t.as_str() == Some(tag)) {
            tags.push(Value::from(tag));
            count += 1;
        }
    }
    count
}

/// Removes every occurrence of `tag`.
pub fn remove_tag(resources: &mut ResourceMap, tag: &str) -> usize {
    let mut count = 0;
    for tags in resources.values_mut().filter_map(tags_mut) {
        let before = tags.len();
        tags.retain(|t| t.as_str() != Some(tag));
        if tags.len() != before {
            count += 1;
        }
    }
    count
}

/// Keeps a single occurrence of `tag` on each resource.
pub fn dedupe_tag(resources: &mut ResourceMap, tag: &str) -> usize {
    let mut count = 0;
    for tags in resources.values_mut().filter_map(tags_mut) {
        let mut seen = false;
        let before = tags.len();
        tags.retain(|t| {
            if t.as_str() != Some(tag) {
                return true;
            }
            !std::mem::replace(&mut seen, true)
        });
        if tags.len() != before {
            count += 1;
        }
    }
    count
}

/// Renames the key of tags starting with `from` to `to`. Counts tags.
pub fn swap_tag_key(resources: &mut ResourceMap, from: &str, to: &str) -> usize {
    let mut count = 0;
    for tags in resources.values_mut().filter_map(tags_mut) {
        for tag in tags.iter_mut() {
            let Some(swapped) = tag.as_str().and_then(|t| t.strip_prefix(from)).map(|rest| format!("{to}{rest}"))
            else {
                continue;
            };
            *tag = Value::String(swapped);
            count += 1;
        }
    }
    count
}

/// Applies the first matching rewrite to each tag. Counts tags.
pub fn rewrite_tags(resources: &mut ResourceMap, rewrites: &[TagRewrite]) -> usize {
    let mut count = 0;
    for tags in resources.values_mut().filter_map(tags_mut) {
        for tag in tags.iter_mut() {
            let Some(current) = tag.as_str() else {
                continue;
            };
            let Some(rewrite) = rewrites.iter().find(|r| r.pattern.is_match(current)) else {
                continue;
            };
            let rewritten = rewrite.pattern.replace_all(current, rewrite.replacement.as_str()).into_owned();
            if rewritten != current {
                *tag = Value::String(rewritten);
                count += 1;
            }
        }
    }
    count
}

/// Returns the canonical environment for an `env:` tag whose value is one of
/// the aliases. Keys and values are compared case-insensitively, ignoring
/// surrounding spaces.
fn canonical_env<'a>(tag: &str, aliases: &'a BTreeMap<String, Vec<String>>) -> Option<&'a str> {
    let (key, value) = tag.split_once(':')?;
    if !key.trim().eq_ignore_ascii_case("env") {
        return None;
    }
    let value = value.trim();
    aliases
        .iter()
        .find(|(_, names)| names.iter().any(|n| n.eq_ignore_ascii_case(value)))
        .map(|(env, _)| env.as_str())
}

/// Rewrites aliased `env:` tags to `env:<canonical>`, leaving one tag per
/// environment.
pub fn rewrite_env_tags(resources: &mut ResourceMap, aliases: &BTreeMap<String, Vec<String>>) -> usize {
    if aliases.is_empty() {
        return 0;
    }

    let mut count = 0;
    for tags in resources.values_mut().filter_map(tags_mut) {
        let mut rewritten: Vec<Value> = Vec::with_capacity(tags.len());
        let mut changed = false;

        for tag in tags.drain(..) {
            match tag.as_str().and_then(|t| canonical_env(t, aliases)) {
                Some(env) => {
                    changed = true;
                    let replacement = Value::String(format!("env:{env}"));
                    if !rewritten.contains(&replacement) {
                        rewritten.push(replacement);
                    }
                }
                None => rewritten.push(tag),
            }
        }

        if changed {
            // An `env:<canonical>` tag that was already there is kept once.
            let mut seen: Vec<Value> = Vec::with_capacity(rewritten.len());
            rewritten.retain(|t| {
                if seen.contains(t) {
                    return false;
                }
                seen.push(t.clone());
                true
            });
            count += 1;
        }
        *tags = rewritten;
    }
    count
}

/// Drops resources carrying `tag`.
pub fn drop_tagged(resources: &mut ResourceMap, tag: &str) -> usize {
    let before = resources.len();
    resources.retain(|_, body| !has_tag(body, tag));
    before - resources.len()
}

/// Drops resources not carrying `tag`.
pub fn keep_tagged(resources: &mut ResourceMap, tag: &str) -> usize {
    let before = resources.len();
    resources.retain(|_, body| has_tag(body, tag));
    before - resources.len()
}

/// Drops resources whose `name` is not one of `names`.
pub fn keep_named(resources: &mut ResourceMap, names: &[String]) -> usize {
    let before = resources.len();
    resources.retain(|_, body| {
        body.get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| names.iter().any(|n| n == name))
    });
    before - resources.len()
}

/// Returns the ids of resources with no tag containing any of `keys`.
#[must_use]
pub fn missing_tag_keys(resources: &ResourceMap, keys: &[String]) -> Vec<String> {
    if keys.is_empty() {
        return Vec::new();
    }
    resources
        .iter()
        .filter(|(_, body)| {
            let tags = body.get("tags").and_then(Value::as_array);
            !tags.is_some_and(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .any(|t| keys.iter().any(|k| t.contains(k.as_str())))
            })
        })
        .map(|(id, _)| id.clone())
        .collect()
}

/// Sets `options.tick_every` where present.
pub fn set_tick_every(resources: &mut ResourceMap, secs: u64) -> usize {
    let mut count = 0;
    for options in resources.values_mut().filter_map(|b| b.get_mut("options").and_then(Value::as_object_mut)) {
        if let Some(tick_every) = options.get_mut("tick_every") {
            *tick_every = Value::from(secs);
            count += 1;
        }
    }
    count
}

/// Sets `options.retry.count` where a retry policy exists.
pub fn set_retry_count(resources: &mut ResourceMap, retries: u64) -> usize {
    let mut count = 0;
    for retry in resources
        .values_mut()
        .filter_map(|b| b.pointer_mut("/options/retry").and_then(Value::as_object_mut))
    {
        retry.insert("count".to_string(), Value::from(retries));
        count += 1;
    }
    count
}

/// Replaces private locations listed under a target in `swaps`
/// (target to replaced locations) with that target. Counts locations.
pub fn swap_private_locations(resources: &mut ResourceMap, swaps: &BTreeMap<String, Vec<String>>) -> usize {
    if swaps.is_empty() {
        return 0;
    }

    let mut count = 0;
    for (id, body) in resources.iter_mut() {
        let Some(locations) = body.get_mut("locations").and_then(Value::as_array_mut) else {
            continue;
        };
        for location in locations.iter_mut() {
            let Some(current) = location.as_str().map(str::to_string) else {
                continue;
            };
            if swaps.contains_key(&current) {
                continue;
            }
            match swaps.iter().find(|(_, replaced)| replaced.contains(&current)) {
                Some((target, _)) => {
                    *location = Value::String(target.clone());
                    count += 1;
                }
                None if PRIVATE_LOCATION_ID.is_match(&current) => {
                    warn!("Unexpected private location {current} in {id}");
                }
                None => {}
            }
        }
    }
    count
}

/// Points `config.variables` entries at the global variable ids in `swaps`,
/// keyed by variable name. Counts variables.
pub fn swap_global_variables(resources: &mut ResourceMap, swaps: &BTreeMap<String, VariableSwap>) -> usize {
    if swaps.is_empty() {
        return 0;
    }

    let mut count = 0;
    for (id, body) in resources.iter_mut() {
        let Some(variables) = body.pointer_mut("/config/variables").and_then(Value::as_array_mut) else {
            continue;
        };
        for variable in variables.iter_mut().filter_map(Value::as_object_mut) {
            let (Some(name), Some(current)) = (
                variable.get("name").and_then(Value::as_str),
                variable.get("id").and_then(Value::as_str),
            ) else {
                continue;
            };
            let Some(swap) = swaps.get(name) else {
                continue;
            };
            if current == swap.id {
                continue;
            }
            if !swap.replaces.iter().any(|r| r == current) {
                warn!("Unknown id {current} for global variable {name} in {id}");
                continue;
            }
            variable.insert("id".to_string(), Value::String(swap.id.clone()));
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resources(entries: &[(&str, Value)]) -> ResourceMap {
        entries.iter().map(|(id, body)| ((*id).to_string(), body.clone())).collect()
    }

    fn tagged(entries: &[(&str, &[&str])]) -> ResourceMap {
        entries
            .iter()
            .map(|(id, tags)| ((*id).to_string(), json!({ "tags": tags })))
            .collect()
    }

    fn sorted_tags(resources: &ResourceMap, id: &str) -> Vec<String> {
        let mut tags: Vec<String> = resources[id]["tags"]
            .as_array()
            .expect("tags")
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect();
        tags.sort();
        tags
    }

    fn env_aliases() -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([
            ("dev".to_string(), vec!["acme-dev".to_string(), "acme-ci".to_string()]),
            ("qa".to_string(), vec!["acme-qa".to_string()]),
            ("stage".to_string(), vec!["acme-stage".to_string()]),
            ("prod".to_string(), vec!["acme-prod".to_string()]),
        ])
    }

    #[test]
    fn test_dev_and_ci_fold_into_one_env_tag() {
        let mut data = tagged(&[
            ("dev and ci", &["env:acme-dev", "env:acme-ci"]),
            ("ci and dev", &["env:acme-ci", "env:acme-dev"]),
            ("ci", &["env:acme-ci", "team:acme"]),
        ]);

        assert_eq!(rewrite_env_tags(&mut data, &env_aliases()), 3);
        assert_eq!(sorted_tags(&data, "dev and ci"), vec!["env:dev"]);
        assert_eq!(sorted_tags(&data, "ci and dev"), vec!["env:dev"]);
        assert_eq!(sorted_tags(&data, "ci"), vec!["env:dev", "team:acme"]);
    }

    #[test]
    fn test_each_environment_is_rewritten() {
        let mut data = tagged(&[
            ("dev", &["env:acme-dev", "team:acme"]),
            ("qa", &["env:acme-qa"]),
            ("stage", &["team:acme", "env:acme-stage"]),
            ("prod", &["env:acme-prod"]),
        ]);

        rewrite_env_tags(&mut data, &env_aliases());

        assert_eq!(sorted_tags(&data, "dev"), vec!["env:dev", "team:acme"]);
        assert_eq!(sorted_tags(&data, "qa"), vec!["env:qa"]);
        assert_eq!(sorted_tags(&data, "stage"), vec!["env:stage", "team:acme"]);
        assert_eq!(sorted_tags(&data, "prod"), vec!["env:prod"]);
    }

    #[test]
    fn test_env_aliases_ignore_case_and_spaces() {
        let mut data = tagged(&[
            ("capitalized", &["env:Acme-dev", "team:acme"]),
            ("spaced", &["env: acme-dev", "team:acme"]),
            ("trailing", &["env:acme-qa "]),
            ("existing", &["env:dev", "env:acme-dev"]),
        ]);

        rewrite_env_tags(&mut data, &env_aliases());

        assert_eq!(sorted_tags(&data, "capitalized"), vec!["env:dev", "team:acme"]);
        assert_eq!(sorted_tags(&data, "spaced"), vec!["env:dev", "team:acme"]);
        assert_eq!(sorted_tags(&data, "trailing"), vec!["env:qa"]);
        assert_eq!(sorted_tags(&data, "existing"), vec!["env:dev"]);
    }

    #[test]
    fn test_keep_tagged() {
        let mut data = tagged(&[
            ("dev", &["env:acme-dev", "team:acme"]),
            ("qa", &["env:acme-qa"]),
            ("stage", &["team:acme", "env:acme-stage"]),
        ]);
        data.insert("untagged".to_string(), json!({"name": "no tags"}));

        assert_eq!(keep_tagged(&mut data, "env:acme-dev"), 3);
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["dev"]);
    }

    #[test]
    fn test_keep_named() {
        let mut data = resources(&[
            ("1", json!({"name": "cpu high"})),
            ("2", json!({"name": "disk full"})),
            ("3", json!({})),
        ]);

        assert_eq!(keep_named(&mut data, &["disk full".to_string()]), 2);
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["2"]);
    }

    #[test]
    fn test_add_tag_only_where_missing() {
        let mut data = tagged(&[("dev", &["team:acme"]), ("empty", &[]), ("done", &["business_unit:acme"])]);

        assert_eq!(add_tag(&mut data, "business_unit:acme"), 2);
        assert_eq!(sorted_tags(&data, "dev"), vec!["business_unit:acme", "team:acme"]);
        assert_eq!(sorted_tags(&data, "empty"), vec!["business_unit:acme"]);
        assert_eq!(sorted_tags(&data, "done"), vec!["business_unit:acme"]);
    }

    #[test]
    fn test_terraform_resources_are_dropped() {
        let mut data = tagged(&[
            ("no terraform", &["env:acme-dev", "team:acme"]),
            ("terraform", &["env:acme-qa", TERRAFORM_TAG]),
        ]);

        assert_eq!(drop_tagged(&mut data, TERRAFORM_TAG), 1);
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["no terraform"]);
    }

    #[test]
    fn test_regex_rewrite_drops_asset_id_prefix() {
        let mut data = tagged(&[("object", &["acme-asset-id:a12345", "acme-asset-id:678"])]);
        let rewrites = [TagRewrite {
            pattern: Regex::new(r"(?i)^acme-asset-id:a(\w+)$").expect("regex"),
            replacement: "acme-asset-id:$1".to_string(),
        }];

        assert_eq!(rewrite_tags(&mut data, &rewrites), 1);
        assert_eq!(sorted_tags(&data, "object"), vec!["acme-asset-id:12345", "acme-asset-id:678"]);
    }

    #[test]
    fn test_swap_tag_key() {
        let mut data = tagged(&[("object", &["legacy-asset-insight-id:12345", "team:acme"])]);

        assert_eq!(swap_tag_key(&mut data, "legacy-asset-insight-id", "acme-asset-id"), 1);
        assert_eq!(sorted_tags(&data, "object"), vec!["acme-asset-id:12345", "team:acme"]);
    }

    #[test]
    fn test_remove_accidental_tags() {
        let mut data = tagged(&[(
            "object",
            &["business", "busines", "business_unit:acme", "team:acme", "env:stage"],
        )]);

        remove_tag(&mut data, "business");
        remove_tag(&mut data, "busines");

        assert_eq!(sorted_tags(&data, "object"), vec!["business_unit:acme", "env:stage", "team:acme"]);
    }

    #[test]
    fn test_duplicate_sync_tag_is_kept_once() {
        let mut data = tagged(&[(
            "object",
            &["managed_by:datadog-sync", "managed_by:datadog-sync", "team:acme", "env:stage"],
        )]);

        assert_eq!(dedupe_tag(&mut data, "managed_by:datadog-sync"), 1);
        assert_eq!(
            sorted_tags(&data, "object"),
            vec!["env:stage", "managed_by:datadog-sync", "team:acme"]
        );
    }

    #[test]
    fn test_count_tagged() {
        let mut data = tagged(&[
            ("dev", &["env:acme-dev", "team:acme"]),
            ("qa", &["env:acme-qa"]),
            ("stage", &["team:acme", "env:acme-stage"]),
            ("prod", &["env:acme-prod"]),
        ]);
        data.insert("untagged".to_string(), json!({"name": "x"}));

        assert_eq!(count_tagged(&data), 4);
    }

    #[test]
    fn test_missing_tag_keys() {
        let data = tagged(&[
            ("has", &["acme-asset-id:1"]),
            ("legacy", &["legacy-asset-insight-id:2"]),
            ("none", &["team:acme"]),
        ]);
        let keys = vec!["acme-asset-id".to_string(), "legacy-asset-insight-id".to_string()];

        assert_eq!(missing_tag_keys(&data, &keys), vec!["none".to_string()]);
    }

    #[test]
    fn test_synthetic_options() {
        let mut data = resources(&[
            ("api", json!({"options": {"tick_every": 60, "retry": {"count": 2, "interval": 300}}})),
            ("browser", json!({"options": {"tick_every": 900}})),
            ("other", json!({"name": "no options"})),
        ]);

        assert_eq!(set_tick_every(&mut data, WEEKLY_TICK_SECS), 2);
        assert_eq!(set_retry_count(&mut data, 0), 1);
        assert_eq!(data["api"]["options"], json!({"tick_every": 604_800, "retry": {"count": 0, "interval": 300}}));
        assert_eq!(data["browser"]["options"], json!({"tick_every": 604_800}));
    }

    #[test]
    fn test_private_locations_are_swapped() {
        let swaps = BTreeMap::from([
            ("pl:acme-stage-prod".to_string(), vec!["pl:old-stage".to_string(), "pl:old-prod".to_string()]),
            ("pl:acme-dev-qa".to_string(), vec!["pl:old-dev".to_string()]),
        ]);
        let mut data = resources(&[
            ("stage/prod", json!({"locations": ["pl:old-prod", "aws:eu-central-1"]})),
            ("dev/qa", json!({"locations": ["pl:old-dev", "pl:acme-dev-qa", "pl:unknown"]})),
        ]);

        assert_eq!(swap_private_locations(&mut data, &swaps), 2);
        assert_eq!(data["stage/prod"]["locations"], json!(["pl:acme-stage-prod", "aws:eu-central-1"]));
        assert_eq!(data["dev/qa"]["locations"], json!(["pl:acme-dev-qa", "pl:acme-dev-qa", "pl:unknown"]));
    }

    #[test]
    fn test_global_variables_are_swapped() {
        let swaps = BTreeMap::from([
            (
                "BOT_USERNAME".to_string(),
                VariableSwap {
                    id: "new-user".to_string(),
                    replaces: vec!["old-user".to_string(), "other-user".to_string()],
                },
            ),
            (
                "BOT_PASSWORD".to_string(),
                VariableSwap {
                    id: "new-pass".to_string(),
                    replaces: vec!["old-pass".to_string()],
                },
            ),
        ]);
        let mut data = resources(&[(
            "login",
            json!({"config": {"variables": [
                {"type": "global", "name": "BOT_USERNAME", "id": "old-user"},
                {"type": "global", "name": "BOT_PASSWORD", "id": "old-pass"},
                {"type": "global", "name": "BOT_PASSWORD", "id": "stranger"},
                {"type": "text", "name": "PLAIN", "id": "kept"}
            ]}}),
        )]);

        assert_eq!(swap_global_variables(&mut data, &swaps), 2);
        assert_eq!(
            data["login"]["config"]["variables"],
            json!([
                {"type": "global", "name": "BOT_USERNAME", "id": "new-user"},
                {"type": "global", "name": "BOT_PASSWORD", "id": "new-pass"},
                {"type": "global", "name": "BOT_PASSWORD", "id": "stranger"},
                {"type": "text", "name": "PLAIN", "id": "kept"}
            ])
        );
    }
}
