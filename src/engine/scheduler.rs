//! Dependency-ordered application of source state to the destination.
//!
//! Groups are applied one after the other. Within a group every resource is
//! applied concurrently under the run's worker limit, and results are recorded
//! into state by this task only as the operations complete.

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::client::ApiClient;
use crate::config::SyncConfig;
use crate::error::{ApplyError, Result};
use crate::resources::{ConnectContext, ResourceRegistry, ResourceType};
use crate::state::{Origin, State};

use super::diff::diff_bodies;
use super::graph::dependency_groups;
use super::resolver::{describe, prepare_body, resolve_references};
use super::summary::RunSummary;

/// Upper bound on resolution passes inside one group.
pub const MAX_RESOLUTION_PASSES: usize = 5;

/// A `(type, id)` pair.
type Key = (String, String);

/// A resource ready to be sent to the destination.
struct Job {
    resource: Arc<dyn ResourceType>,
    id: String,
    body: Value,
    current: Option<Value>,
}

/// What happened to one resource.
#[derive(Debug)]
enum Outcome {
    Created(String, Value),
    Updated(String, Value),
    Unchanged,
}

/// Applies source state to the destination in dependency order.
#[derive(Debug)]
pub struct ApplyScheduler<'a> {
    registry: &'a ResourceRegistry,
    source: &'a ApiClient,
    destination: &'a ApiClient,
    config: &'a SyncConfig,
    limiter: Arc<Semaphore>,
}

impl<'a> ApplyScheduler<'a> {
    /// Creates a scheduler.
    #[must_use]
    pub const fn new(
        registry: &'a ResourceRegistry,
        source: &'a ApiClient,
        destination: &'a ApiClient,
        config: &'a SyncConfig,
        limiter: Arc<Semaphore>,
    ) -> Self {
        Self {
            registry,
            source,
            destination,
            config,
            limiter,
        }
    }

    /// Applies every group in order.
    ///
    /// Returns the resources whose references were still unresolved after
    /// forced dependency import. The list is always empty unless missing
    /// dependencies are forced.
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool is shut down. Per-resource
    /// failures are logged and counted in `summary`.
    pub async fn apply(
        &self,
        state: &mut State,
        groups: &[Vec<String>],
        summary: &mut RunSummary,
    ) -> Result<Vec<Key>> {
        let mut hooked = HashSet::new();
        let mut hard_failures = Vec::new();

        for group in groups {
            info!("Applying {}", group.join(", "));
            self.run_hooks(group, &mut hooked).await?;

            let pending = self.pending(state, group);
            if self.config.forces_dependencies() {
                self.force_dependencies(state, group, &pending, &mut hooked, summary, &mut hard_failures)
                    .await?;
            }
            self.resolve_and_apply(state, group, pending, summary, &mut hard_failures)
                .await?;
        }

        Ok(hard_failures)
    }

    /// Runs the pre-apply hook of each type once per run.
    async fn run_hooks(&self, types: &[String], hooked: &mut HashSet<String>) -> Result<()> {
        for ty in types {
            if !hooked.insert(ty.clone()) {
                continue;
            }
            let Some(resource) = self.registry.get(ty) else {
                continue;
            };
            let _permit = self.limiter.acquire().await.map_err(|_| ApplyError::WorkersClosed)?;
            if let Err(e) = resource.pre_apply_hook(self.destination).await {
                error!("Pre-apply hook for {ty} failed: {e}");
            }
        }
        Ok(())
    }

    /// Source resources of `group` that pass the filters.
    fn pending(&self, state: &State, group: &[String]) -> Vec<Key> {
        group
            .iter()
            .filter_map(|ty| state.map(Origin::Source, ty).map(|map| (ty, map)))
            .flat_map(|(ty, map)| {
                map.iter()
                    .filter(move |(_, body)| self.config.filters.is_match(ty, body))
                    .map(move |(id, _)| (ty.clone(), id.clone()))
            })
            .collect()
    }

    /// Resolves and applies `pending` in bounded passes.
    async fn resolve_and_apply(
        &self,
        state: &mut State,
        group: &[String],
        mut pending: Vec<Key>,
        summary: &mut RunSummary,
        hard_failures: &mut Vec<Key>,
    ) -> Result<()> {
        let mut pass = 1;

        while !pending.is_empty() {
            let final_pass = pass >= MAX_RESOLUTION_PASSES;
            let (mut jobs, mut deferred) =
                self.classify(state, group, &pending, final_pass, summary, hard_failures);

            if jobs.is_empty() && !deferred.is_empty() {
                debug!("Pass {pass} made no progress on {}", group.join(", "));
                (jobs, deferred) = self.classify(state, group, &deferred, true, summary, hard_failures);
            }

            debug!("Pass {pass}: {} ready, {} deferred", jobs.len(), deferred.len());
            self.run_jobs(state, jobs, summary).await?;

            pending = deferred;
            pass += 1;
        }

        Ok(())
    }

    /// Splits `pending` into jobs ready to run and resources deferred to the
    /// next pass. Resources that can never be applied are counted as failed.
    fn classify(
        &self,
        state: &State,
        group: &[String],
        pending: &[Key],
        final_pass: bool,
        summary: &mut RunSummary,
        hard_failures: &mut Vec<Key>,
    ) -> (Vec<Job>, Vec<Key>) {
        let ctx = ConnectContext::new(state, self.registry);
        let mut jobs = Vec::new();
        let mut deferred = Vec::new();

        for (ty, id) in pending {
            let (Some(resource), Some(source_body)) = (self.registry.get(ty), state.get(Origin::Source, ty, id))
            else {
                continue;
            };

            let (body, unresolved) =
                prepare_body(resource.as_ref(), source_body, &ctx, self.config.sync_tag.as_deref());

            if !unresolved.is_empty() {
                let within_group = unresolved.iter().all(|u| group.iter().any(|g| g == u.target));
                if within_group && !final_pass {
                    deferred.push((ty.clone(), id.clone()));
                    continue;
                }

                if !self.config.applies_unresolved() {
                    error!("Skipping {ty} {id}: unresolved references {}", describe(&unresolved));
                    summary.entry(ty).failed += 1;
                    if self.config.forces_dependencies() {
                        hard_failures.push((ty.clone(), id.clone()));
                    }
                    continue;
                }
                warn!("Applying {ty} {id} with unresolved references {}", describe(&unresolved));
            }

            jobs.push(Job {
                resource: resource.clone(),
                id: id.clone(),
                body,
                current: state.get(Origin::Destination, ty, id).cloned(),
            });
        }

        (jobs, deferred)
    }

    async fn run_jobs(&self, state: &mut State, jobs: Vec<Job>, summary: &mut RunSummary) -> Result<()> {
        let mut in_flight: FuturesUnordered<_> = jobs.into_iter().map(|job| self.run_job(job)).collect();

        while let Some(done) = in_flight.next().await {
            let (ty, id, outcome) = done?;
            match outcome {
                Ok(Outcome::Created(key, body)) => {
                    debug!("Created {ty} {id}");
                    state.insert(Origin::Destination, ty, key, body);
                    summary.entry(ty).created += 1;
                }
                Ok(Outcome::Updated(key, body)) => {
                    debug!("Updated {ty} {id}");
                    state.insert(Origin::Destination, ty, key, body);
                    summary.entry(ty).updated += 1;
                }
                Ok(Outcome::Unchanged) => {
                    debug!("{ty} {id} is up to date");
                    summary.entry(ty).skipped += 1;
                }
                Err(e) => {
                    error!("Error applying {ty} {id}: {e}");
                    summary.entry(ty).failed += 1;
                }
            }
        }

        Ok(())
    }

    /// The outer result is fatal, the inner one is a per-resource failure.
    async fn run_job(&self, job: Job) -> Result<(&'static str, String, Result<Outcome>)> {
        let _permit = self.limiter.acquire().await.map_err(|_| ApplyError::WorkersClosed)?;
        let ty = job.resource.name();
        let id = job.id.clone();
        Ok((ty, id, self.execute(job).await))
    }

    async fn execute(&self, job: Job) -> Result<Outcome> {
        let Job {
            resource,
            id,
            mut body,
            current,
        } = job;

        resource.pre_resource_action_hook(&id, &mut body).await?;

        let Some(current) = current else {
            let (key, created) = resource.create_resource(self.destination, &id, body).await?;
            return Ok(Outcome::Created(key, created));
        };

        if diff_bodies(&body, &current, resource.config().excluded_attributes).is_empty() {
            return Ok(Outcome::Unchanged);
        }

        let (key, updated) = resource
            .update_resource(self.destination, &id, body, &current)
            .await?;
        Ok(Outcome::Updated(key, updated))
    }

    /// Imports referenced resources missing from the destination and applies
    /// them ahead of `pending`.
    async fn force_dependencies(
        &self,
        state: &mut State,
        group: &[String],
        pending: &[Key],
        hooked: &mut HashSet<String>,
        summary: &mut RunSummary,
        hard_failures: &mut Vec<Key>,
    ) -> Result<()> {
        let mut dependencies: BTreeSet<Key> = BTreeSet::new();
        let mut frontier = pending.to_vec();

        for _ in 0..MAX_RESOLUTION_PASSES {
            let missing = self.missing_references(state, group, &frontier, &dependencies);
            if missing.is_empty() {
                break;
            }
            frontier = self.import_missing(state, missing).await?;
            dependencies.extend(frontier.iter().cloned());
        }

        if dependencies.is_empty() {
            return Ok(());
        }

        let types: Vec<String> = dependencies
            .iter()
            .map(|(ty, _)| ty.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        info!("Applying {} forced dependencies first", dependencies.len());

        for dependency_group in dependency_groups(self.registry, &types) {
            self.run_hooks(&dependency_group, hooked).await?;
            let pending = dependencies
                .iter()
                .filter(|(ty, _)| dependency_group.contains(ty))
                .cloned()
                .collect();
            self.resolve_and_apply(state, &dependency_group, pending, summary, hard_failures)
                .await?;
        }

        Ok(())
    }

    /// References of `frontier` into other groups that the destination lacks.
    fn missing_references(
        &self,
        state: &State,
        group: &[String],
        frontier: &[Key],
        known: &BTreeSet<Key>,
    ) -> BTreeSet<Key> {
        let ctx = ConnectContext::new(state, self.registry);
        let mut missing = BTreeSet::new();

        for (ty, id) in frontier {
            let (Some(resource), Some(source_body)) = (self.registry.get(ty), state.get(Origin::Source, ty, id))
            else {
                continue;
            };
            let mut body = source_body.clone();
            for reference in resolve_references(resource.as_ref(), &mut body, &ctx) {
                if group.iter().any(|g| g == reference.target) {
                    continue;
                }
                let key = (reference.target.to_string(), reference.value);
                if !known.contains(&key) {
                    missing.insert(key);
                }
            }
        }

        missing
    }

    /// Makes sure each missing reference is in source state, fetching it from
    /// the source organization when needed. Returns the state keys obtained.
    async fn import_missing(&self, state: &mut State, missing: BTreeSet<Key>) -> Result<Vec<Key>> {
        let mut found = Vec::new();
        let mut fetches = FuturesUnordered::new();

        for (ty, id) in missing {
            if state.contains(Origin::Source, &ty, &id) {
                found.push((ty, id));
            } else if let Some(resource) = self.registry.get(&ty).cloned() {
                fetches.push(self.fetch(resource, id));
            }
        }

        while let Some(done) = fetches.next().await {
            let (ty, id, fetched) = done?;
            match fetched {
                Ok((key, body)) => {
                    debug!("Imported missing dependency {ty} {id}");
                    state.insert(Origin::Source, ty, key.clone(), body);
                    found.push((ty.to_string(), key));
                }
                Err(e) => error!("Error importing missing dependency {ty} {id}: {e}"),
            }
        }

        Ok(found)
    }

    async fn fetch(
        &self,
        resource: Arc<dyn ResourceType>,
        id: String,
    ) -> Result<(&'static str, String, Result<(String, Value)>)> {
        let _permit = self.limiter.acquire().await.map_err(|_| ApplyError::WorkersClosed)?;
        let fetched = resource.import_resource(self.source, Some(&id), None).await;
        Ok((resource.name(), id, fetched))
    }
}
