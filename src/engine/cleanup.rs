//! Deletion of destination resources that left the source.

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::client::ApiClient;
use crate::config::CleanupPolicy;
use crate::error::{ApplyError, Result};
use crate::resources::{ResourceRegistry, ResourceType};
use crate::state::{Origin, State};

use super::summary::RunSummary;

/// Deletes destination resources with no source counterpart.
#[derive(Debug)]
pub struct CleanupStage<'a> {
    registry: &'a ResourceRegistry,
    destination: &'a ApiClient,
    policy: CleanupPolicy,
    limiter: Arc<Semaphore>,
}

impl<'a> CleanupStage<'a> {
    /// Creates a cleanup stage.
    #[must_use]
    pub const fn new(
        registry: &'a ResourceRegistry,
        destination: &'a ApiClient,
        policy: CleanupPolicy,
        limiter: Arc<Semaphore>,
    ) -> Self {
        Self {
            registry,
            destination,
            policy,
            limiter,
        }
    }

    /// Deletes the cleanup candidates of `ordered_types`, dependents first.
    ///
    /// `ordered_types` is the apply order; it is walked backwards. Under
    /// [`CleanupPolicy::Allow`] `confirm` is asked once with every candidate
    /// and nothing is deleted unless it returns true.
    ///
    /// Returns the number of deleted resources.
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool is shut down.
    pub async fn run<F>(
        &self,
        state: &mut State,
        ordered_types: &[String],
        confirm: F,
        summary: &mut RunSummary,
    ) -> Result<usize>
    where
        F: FnOnce(&[(String, String)]) -> bool,
    {
        if self.policy == CleanupPolicy::Off {
            return Ok(0);
        }

        let reversed: Vec<String> = ordered_types.iter().rev().cloned().collect();
        let candidates = state.resources_to_cleanup(&reversed);
        if candidates.is_empty() {
            debug!("Nothing to clean up");
            return Ok(0);
        }

        if self.policy == CleanupPolicy::Allow && !confirm(&candidates) {
            info!("Cleanup of {} resources declined", candidates.len());
            return Ok(0);
        }

        let mut deleted = 0;
        for ty in &reversed {
            let Some(resource) = self.registry.get(ty) else {
                continue;
            };

            let mut in_flight: FuturesUnordered<_> = candidates
                .iter()
                .filter(|(candidate_ty, _)| candidate_ty == ty)
                .filter_map(|(_, id)| {
                    state
                        .get(Origin::Destination, ty, id)
                        .map(|current| self.delete(resource.clone(), id.clone(), current.clone()))
                })
                .collect();

            let mut removed = Vec::new();
            while let Some(done) = in_flight.next().await {
                let (id, result) = done?;
                match result {
                    Ok(()) => removed.push(id),
                    Err(e) => {
                        error!("Error deleting {ty} {id}: {e}");
                        summary.entry(ty).failed += 1;
                    }
                }
            }

            for id in removed {
                debug!("Deleted {ty} {id}");
                state.remove(Origin::Destination, ty, &id);
                summary.entry(ty).deleted += 1;
                deleted += 1;
            }
        }

        info!("Cleaned up {deleted} resources");
        Ok(deleted)
    }

    /// The outer result is fatal, the inner one is a per-resource failure.
    async fn delete(
        &self,
        resource: Arc<dyn ResourceType>,
        id: String,
        current: Value,
    ) -> Result<(String, Result<()>)> {
        let _permit = self.limiter.acquire().await.map_err(|_| ApplyError::WorkersClosed)?;
        let result = match resource.delete_resource(self.destination, &id, &current).await {
            Err(e) if self.policy == CleanupPolicy::Force && e.http_status() == Some(404) => {
                debug!("{} {id} was already gone", resource.name());
                Ok(())
            }
            other => other,
        };
        Ok((id, result))
    }
}
