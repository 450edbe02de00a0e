//! Command runner.
//!
//! Ties the engine stages together for one command: lock state, check
//! credentials, load state, run the stages, persist, release the lock. The
//! lock is refreshed in the background for as long as the command runs.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::config::{Command, SyncConfig};
use crate::engine::{
    dependency_groups, flatten, ApplyScheduler, CleanupStage, DiffEngine, DiffReport, Importer, RunSummary,
};
use crate::error::{ApplyError, Result, StateError, SyncError};
use crate::resources::ResourceRegistry;
use crate::state::{generate_holder_id, LockInfo, Origin, State, StateStore, LOCK_REFRESH_SECS};

/// Result of one command.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Command that ran.
    pub command: Command,
    /// Per-type counters.
    pub summary: RunSummary,
    /// Diff report, for `diffs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<DiffReport>,
}

impl RunReport {
    /// Returns true if a `diffs` run found any difference.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.diff.as_ref().is_some_and(DiffReport::has_changes)
    }
}

/// Runs one command against the configured organizations.
pub struct SyncRunner<'a, S: StateStore> {
    /// Settings of the invocation.
    config: &'a SyncConfig,
    /// Registered resource types.
    registry: &'a ResourceRegistry,
    /// State store.
    store: &'a S,
    /// Source organization client.
    source: ApiClient,
    /// Destination organization client.
    destination: ApiClient,
    /// Worker limit shared by every stage.
    limiter: Arc<Semaphore>,
    /// Interval between lock refreshes.
    lock_refresh: Duration,
}

impl<'a, S: StateStore> SyncRunner<'a, S> {
    /// Creates a runner. No request is sent until [`Self::run`].
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: &'a SyncConfig, registry: &'a ResourceRegistry, store: &'a S) -> Result<Self> {
        Ok(Self {
            config,
            registry,
            store,
            source: ApiClient::new(&config.source)?,
            destination: ApiClient::new(&config.destination)?,
            limiter: Arc::new(Semaphore::new(config.max_workers.max(1))),
            lock_refresh: Duration::from_secs(LOCK_REFRESH_SECS),
        })
    }

    /// Sets the interval between lock refreshes.
    #[must_use]
    pub fn with_lock_refresh(mut self, every: Duration) -> Self {
        self.lock_refresh = every;
        self
    }

    /// Runs the configured command.
    ///
    /// `confirm` is asked before cleanup deletes anything under the `true`
    /// cleanup policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the state lock cannot be taken or is lost to
    /// another run, credentials are rejected, state cannot be read or
    /// written, or forced dependencies remain unresolved. Per-resource
    /// failures are only counted.
    pub async fn run<F>(&self, confirm: F) -> Result<RunReport>
    where
        F: FnOnce(&[(String, String)]) -> bool,
    {
        let lock = self.store.acquire_lock(&generate_holder_id()).await?;
        debug!("Acquired {} state lock {}", self.store.backend_type(), lock.lock_id);

        let result = tokio::select! {
            result = self.run_locked(confirm) => result,
            lost = self.keep_lock(lock.clone()) => Err(lost),
        };

        if let Err(e) = self.store.release_lock(&lock.lock_id).await {
            warn!("Failed to release state lock: {e}");
        }
        result
    }

    /// Refreshes `lock` until the run ends. Only returns if another run has
    /// taken the lock over.
    async fn keep_lock(&self, mut lock: LockInfo) -> SyncError {
        loop {
            tokio::time::sleep(self.lock_refresh).await;
            match self.store.refresh_lock(&lock).await {
                Ok(refreshed) => lock = refreshed,
                Err(e @ SyncError::State(StateError::LockedByOther { .. })) => {
                    warn!("State lock {} was taken over, stopping", lock.lock_id);
                    return e;
                }
                Err(e) => warn!("Failed to refresh state lock: {e}"),
            }
        }
    }

    async fn run_locked<F>(&self, confirm: F) -> Result<RunReport>
    where
        F: FnOnce(&[(String, String)]) -> bool,
    {
        let command = self.config.command;
        info!("Running {command} for {}", self.config.resources.join(", "));

        if self.config.validate {
            self.validate_clients().await?;
        }

        let loaded = self.types_to_load();
        let mut state = State::load(self.store, &loaded).await?;
        let mut summary = RunSummary::new();
        let mut diff = None;
        let mut hard_failures = Vec::new();

        match command {
            Command::Import => self.import(&mut state, &mut summary).await?,
            Command::Sync => {
                hard_failures = self.sync(&mut state, &loaded, confirm, &mut summary).await?;
            }
            Command::Diffs => {
                let engine = DiffEngine::new(self.registry, &self.config.filters, self.config.sync_tag.as_deref());
                diff = Some(engine.compute(&state, &self.config.resources, self.config.cleanup));
            }
            Command::Migrate => {
                self.import(&mut state, &mut summary).await?;
                hard_failures = self.sync(&mut state, &loaded, confirm, &mut summary).await?;
            }
        }

        if !hard_failures.is_empty() {
            let resources = hard_failures
                .iter()
                .map(|(ty, id)| format!("{ty}/{id}"))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ApplyError::UnresolvedDependencies {
                count: hard_failures.len(),
                resources,
            }
            .into());
        }

        Ok(RunReport {
            command,
            summary,
            diff,
        })
    }

    async fn validate_clients(&self) -> Result<()> {
        let command = self.config.command;
        if command.uses_source() || (command == Command::Sync && self.config.forces_dependencies()) {
            self.source.validate().await?;
            info!("Source credentials are valid");
        }
        if command.uses_destination() {
            self.destination.validate().await?;
            info!("Destination credentials are valid");
        }
        Ok(())
    }

    /// Selected types plus every type reachable through their connections.
    fn types_to_load(&self) -> Vec<String> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut stack: Vec<String> = self.config.resources.clone();

        while let Some(ty) = stack.pop() {
            if !seen.insert(ty.clone()) {
                continue;
            }
            if let Some(config) = self.registry.config(&ty) {
                stack.extend(config.targets().into_iter().map(str::to_string));
            }
        }

        seen.into_iter().filter(|ty| self.registry.contains(ty)).collect()
    }

    async fn import(&self, state: &mut State, summary: &mut RunSummary) -> Result<()> {
        let importer = Importer::new(
            self.registry,
            &self.source,
            &self.config.filters,
            Arc::clone(&self.limiter),
        );
        importer.run(state, &self.config.resources, summary).await?;
        state
            .persist(self.store, Origin::Source, &self.config.resources)
            .await
    }

    /// Applies and cleans up. Destination state is persisted even when the
    /// run ends with unresolved forced dependencies.
    async fn sync<F>(
        &self,
        state: &mut State,
        loaded: &[String],
        confirm: F,
        summary: &mut RunSummary,
    ) -> Result<Vec<(String, String)>>
    where
        F: FnOnce(&[(String, String)]) -> bool,
    {
        let groups = dependency_groups(self.registry, &self.config.resources);
        let scheduler = ApplyScheduler::new(
            self.registry,
            &self.source,
            &self.destination,
            self.config,
            Arc::clone(&self.limiter),
        );
        let hard_failures = scheduler.apply(state, &groups, summary).await?;

        let cleanup = CleanupStage::new(
            self.registry,
            &self.destination,
            self.config.cleanup,
            Arc::clone(&self.limiter),
        );
        cleanup.run(state, &flatten(&groups), confirm, summary).await?;

        state.persist(self.store, Origin::Destination, loaded).await?;
        if self.config.forces_dependencies() {
            state.persist(self.store, Origin::Source, loaded).await?;
        }

        Ok(hard_failures)
    }
}
