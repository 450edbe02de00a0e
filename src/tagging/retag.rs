//! Bulk retagging of one type's source state.
//!
//! The run loads `<root>/<type>.json`, writes it unchanged to
//! `<root>/<type>_backup.json`, applies the steps below in order and saves
//! the result over the original file:
//!
//! 1. drop resources tagged `created_by:terraform` (dashboards instead keep
//!    only resources carrying the team tag)
//! 2. keep only the requested names, then only the requested tag
//! 3. zero synthetic retries when asked
//! 4. add the business unit tag (not on dashboards) and the team tag
//! 5. fold environment aliases into their canonical `env:` tag (not on
//!    dashboards)
//! 6. report resources missing every required tag key
//! 7. swap tag keys, apply regex rewrites, remove unwanted tags and collapse
//!    duplicated sync tags
//! 8. repoint private locations and global variables
//! 9. set weekly ticks when asked

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_SYNC_TAG;
use crate::error::{ConfigError, Result};
use crate::resources::ResourceRegistry;
use crate::state::{generate_holder_id, Origin, ResourceMap, StateStore};

use super::mapping::TagMapping;
use super::ops;

const DASHBOARDS: &str = "dashboards";
const SYNTHETICS_TESTS: &str = "synthetics_tests";

/// What to retag.
#[derive(Debug, Clone, Default)]
pub struct TagOptions {
    /// Resource type whose source state is rewritten.
    pub resource_type: String,
    /// Keep only resources with one of these names.
    pub names: Vec<String>,
    /// Keep only resources carrying this tag.
    pub tag: Option<String>,
    /// Set synthetic retry counts to zero.
    pub zero_retries: bool,
    /// Set `tick_every` to one week.
    pub weekly_ticks: bool,
}

/// One applied step and how many resources or values it touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagStep {
    /// Step name.
    pub step: String,
    /// Resources or values touched.
    pub count: usize,
}

/// Outcome of a retagging run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TagReport {
    /// Retagged type.
    pub resource_type: String,
    /// State name the untouched copy was saved under.
    pub backup: String,
    /// Steps in the order they ran.
    pub steps: Vec<TagStep>,
    /// Ids of resources missing every required tag key.
    pub missing_required_tags: Vec<String>,
    /// Resources left after filtering.
    pub remaining: usize,
    /// Resources left that carry tags.
    pub tagged: usize,
}

impl TagReport {
    fn record(&mut self, step: impl Into<String>, count: usize) {
        let step = step.into();
        debug!("{}: {step} touched {count}", self.resource_type);
        self.steps.push(TagStep { step, count });
    }
}

/// Rewrites the tags of one type's source state.
pub struct Retagger<'a, S: StateStore> {
    registry: &'a ResourceRegistry,
    store: &'a S,
    mapping: &'a TagMapping,
}

impl<'a, S: StateStore> Retagger<'a, S> {
    /// Creates a retagger.
    #[must_use]
    pub const fn new(registry: &'a ResourceRegistry, store: &'a S, mapping: &'a TagMapping) -> Self {
        Self {
            registry,
            store,
            mapping,
        }
    }

    /// Backs up, rewrites and saves the source state of `options.resource_type`.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown, the options do not fit the
    /// type, the mapping has an invalid pattern, or state cannot be read,
    /// locked or written. Nothing is written when validation fails.
    pub async fn run(&self, options: &TagOptions) -> Result<TagReport> {
        let resource_type = options.resource_type.as_str();
        if !self.registry.contains(resource_type) {
            return Err(ConfigError::validation(format!("unknown resource type '{resource_type}'"), "resource").into());
        }
        if options.zero_retries && resource_type != SYNTHETICS_TESTS {
            return Err(ConfigError::validation(
                format!("retries can only be changed on {SYNTHETICS_TESTS}, not {resource_type}"),
                "change_retry_to_0",
            )
            .into());
        }

        let lock = self.store.acquire_lock(&generate_holder_id()).await?;
        let result = self.run_locked(options).await;
        if let Err(e) = self.store.release_lock(&lock.lock_id).await {
            warn!("Failed to release state lock: {e}");
        }
        result
    }

    async fn run_locked(&self, options: &TagOptions) -> Result<TagReport> {
        let resource_type = options.resource_type.as_str();
        let mut resources = self.store.load(Origin::Source, resource_type).await?;
        info!("Retagging {} {resource_type}", resources.len());

        let backup = format!("{resource_type}_backup");
        self.store.save(Origin::Source, &backup, &resources).await?;
        info!("Saved untouched {resource_type} as {backup}");

        let mut report = retag(&mut resources, self.mapping, options)?;
        report.backup = backup;

        self.store.save(Origin::Source, resource_type, &resources).await?;
        info!(
            "Retagged {resource_type}: {} remaining, {} tagged",
            report.remaining, report.tagged
        );
        Ok(report)
    }
}

/// Applies every retagging step to `resources` in place.
///
/// # Errors
///
/// Returns an error if a rewrite pattern in `mapping` does not compile.
pub fn retag(resources: &mut ResourceMap, mapping: &TagMapping, options: &TagOptions) -> Result<TagReport> {
    let rewrites = mapping.rewrites()?;
    let dashboards = options.resource_type == DASHBOARDS;
    let mut report = TagReport {
        resource_type: options.resource_type.clone(),
        ..TagReport::default()
    };

    if dashboards {
        if let Some(team) = &mapping.team_tag {
            report.record(format!("keep tagged {team}"), ops::keep_tagged(resources, team));
        }
    } else {
        report.record("drop terraform managed", ops::drop_tagged(resources, ops::TERRAFORM_TAG));
    }

    if !options.names.is_empty() {
        report.record("keep named", ops::keep_named(resources, &options.names));
    }
    if let Some(tag) = &options.tag {
        report.record(format!("keep tagged {tag}"), ops::keep_tagged(resources, tag));
    }
    if options.zero_retries {
        report.record("zero retries", ops::set_retry_count(resources, 0));
    }

    if !dashboards {
        if let Some(unit) = &mapping.business_unit_tag {
            report.record(format!("add {unit}"), ops::add_tag(resources, unit));
        }
    }
    if let Some(team) = &mapping.team_tag {
        report.record(format!("add {team}"), ops::add_tag(resources, team));
    }
    if !dashboards && !mapping.env_aliases.is_empty() {
        report.record("fold env aliases", ops::rewrite_env_tags(resources, &mapping.env_aliases));
    }

    report.missing_required_tags = ops::missing_tag_keys(resources, &mapping.required_tag_keys);
    if !report.missing_required_tags.is_empty() {
        warn!(
            "{} {} resource(s) have none of the required tag keys {:?}",
            report.missing_required_tags.len(),
            options.resource_type,
            mapping.required_tag_keys
        );
    }

    for (from, to) in &mapping.tag_key_swaps {
        report.record(format!("swap {from}: to {to}:"), ops::swap_tag_key(resources, from, to));
    }
    if !rewrites.is_empty() {
        report.record("rewrite tags", ops::rewrite_tags(resources, &rewrites));
    }
    for tag in &mapping.remove_tags {
        report.record(format!("remove {tag}"), ops::remove_tag(resources, tag));
    }
    report.record("dedupe sync tag", ops::dedupe_tag(resources, DEFAULT_SYNC_TAG));

    if !mapping.private_locations.is_empty() {
        report.record(
            "swap private locations",
            ops::swap_private_locations(resources, &mapping.private_locations),
        );
    }
    if !mapping.global_variables.is_empty() {
        report.record(
            "swap global variables",
            ops::swap_global_variables(resources, &mapping.global_variables),
        );
    }
    if options.weekly_ticks {
        report.record("weekly ticks", ops::set_tick_every(resources, ops::WEEKLY_TICK_SECS));
    }

    report.remaining = resources.len();
    report.tagged = ops::count_tagged(resources);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{StateError, SyncError};
    use crate::state::LocalStateStore;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn mapping() -> TagMapping {
        TagMapping::parse_yaml(
            r#"
team_tag: team:acme-payments
business_unit_tag: business_unit:acme
env_aliases:
  dev: [acme-dev]
  prod: [acme-prod]
tag_key_swaps:
  legacy-asset-id: asset-id
tag_rewrites:
  - pattern: '^asset-id:a(\w+)$'
    replacement: 'asset-id:$1'
remove_tags: [business]
required_tag_keys: [asset-id]
"#,
            None,
        )
        .expect("mapping")
    }

    fn monitors() -> ResourceMap {
        ResourceMap::from([
            (
                "1".to_string(),
                json!({"name": "Checkout latency", "tags": ["env:acme-prod", "legacy-asset-id:a42", "business"]}),
            ),
            (
                "2".to_string(),
                json!({"name": "Checkout errors", "tags": ["env:acme-dev", "managed_by:datadog-sync", "managed_by:datadog-sync"]}),
            ),
            ("3".to_string(), json!({"name": "Terraform", "tags": ["created_by:terraform"]})),
        ])
    }

    fn options(resource_type: &str) -> TagOptions {
        TagOptions {
            resource_type: resource_type.to_string(),
            ..TagOptions::default()
        }
    }

    fn tags(resources: &ResourceMap, id: &str) -> Vec<String> {
        resources[id]["tags"]
            .as_array()
            .expect("tags")
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_full_pipeline_on_monitors() {
        let mut resources = monitors();
        let report = retag(&mut resources, &mapping(), &options("monitors")).expect("retag");

        assert!(!resources.contains_key("3"));
        assert_eq!(
            tags(&resources, "1"),
            vec!["env:prod", "asset-id:42", "business_unit:acme", "team:acme-payments"]
        );
        assert_eq!(
            tags(&resources, "2"),
            vec!["env:dev", "managed_by:datadog-sync", "business_unit:acme", "team:acme-payments"]
        );
        assert_eq!(report.missing_required_tags, vec!["2".to_string()]);
        assert_eq!(report.remaining, 2);
        assert_eq!(report.tagged, 2);
        assert_eq!(report.steps[0], TagStep { step: "drop terraform managed".into(), count: 1 });
    }

    #[test]
    fn test_dashboards_keep_team_only_and_skip_env_and_unit() {
        let mut resources = ResourceMap::from([
            ("a".to_string(), json!({"name": "Team board", "tags": ["team:acme-payments", "env:acme-dev"]})),
            ("b".to_string(), json!({"name": "Other board", "tags": ["team:acme-search"]})),
            ("c".to_string(), json!({"name": "TF board", "tags": ["team:acme-payments", "created_by:terraform"]})),
        ]);
        retag(&mut resources, &mapping(), &options(DASHBOARDS)).expect("retag");

        assert_eq!(resources.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(tags(&resources, "a"), vec!["team:acme-payments", "env:acme-dev"]);
    }

    #[test]
    fn test_name_and_tag_filters_narrow_the_state() {
        let mut resources = monitors();
        let report = retag(
            &mut resources,
            &TagMapping::default(),
            &TagOptions {
                names: vec!["Checkout latency".into(), "Checkout errors".into()],
                tag: Some("env:acme-dev".into()),
                ..options("monitors")
            },
        )
        .expect("retag");

        assert_eq!(resources.keys().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(report.remaining, 1);
    }

    #[tokio::test]
    async fn test_run_backs_up_before_rewriting() {
        let dir = TempDir::new().expect("tempdir");
        let store = LocalStateStore::with_base_dir(dir.path());
        store.save(Origin::Source, "monitors", &monitors()).await.expect("seed");

        let registry = ResourceRegistry::with_defaults();
        let mapping = mapping();
        let report = Retagger::new(&registry, &store, &mapping)
            .run(&options("monitors"))
            .await
            .expect("run");

        assert_eq!(report.backup, "monitors_backup");
        assert!(store.file_path(Origin::Source, "monitors_backup").exists());
        let backup = store.load(Origin::Source, "monitors_backup").await.expect("backup");
        assert_eq!(backup, monitors());

        let saved = store.load(Origin::Source, "monitors").await.expect("saved");
        assert_eq!(saved.len(), 2);
        assert_eq!(tags(&saved, "1")[0], "env:prod");

        // The lock is released afterwards.
        store.acquire_lock("next").await.expect("lock free");
    }

    #[tokio::test]
    async fn test_run_rejects_bad_options_without_writing() {
        let dir = TempDir::new().expect("tempdir");
        let store = LocalStateStore::with_base_dir(dir.path());
        store.save(Origin::Source, "monitors", &monitors()).await.expect("seed");
        let registry = ResourceRegistry::with_defaults();
        let mapping = TagMapping::default();
        let retagger = Retagger::new(&registry, &store, &mapping);

        let unknown = retagger.run(&options("gadgets")).await;
        assert!(matches!(unknown, Err(SyncError::Config(ConfigError::ValidationError { .. }))));

        let retries = retagger
            .run(&TagOptions {
                zero_retries: true,
                ..options("monitors")
            })
            .await;
        assert!(matches!(retries, Err(SyncError::Config(ConfigError::ValidationError { .. }))));
        assert!(!store.file_path(Origin::Source, "monitors_backup").exists());
    }

    #[tokio::test]
    async fn test_run_refuses_while_another_run_holds_the_lock() {
        let dir = TempDir::new().expect("tempdir");
        let store = LocalStateStore::with_base_dir(dir.path());
        store.save(Origin::Source, "monitors", &monitors()).await.expect("seed");
        store.acquire_lock("sync-run").await.expect("lock");

        let registry = ResourceRegistry::with_defaults();
        let mapping = TagMapping::default();
        let result = Retagger::new(&registry, &store, &mapping).run(&options("monitors")).await;

        assert!(matches!(result, Err(SyncError::State(StateError::LockedByOther { .. }))));
        assert_eq!(store.load(Origin::Source, "monitors").await.expect("load"), monitors());
    }
}
