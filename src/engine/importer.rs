//! Import of source resources into source state.
//!
//! Every selected type is listed concurrently; listed bodies that pass the
//! filters are then normalized one by one. All network calls share the run's
//! worker limit. State is only touched once every type has finished.

use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::client::ApiClient;
use crate::error::{ApplyError, Result};
use crate::filter::FilterSet;
use crate::resources::{ResourceRegistry, ResourceType};
use crate::state::{Origin, ResourceMap, State};

use super::summary::RunSummary;

/// Outcome of importing one type.
struct TypeImport {
    resource_type: String,
    listed: Option<ResourceMap>,
    failed: usize,
}

/// Imports resources from the source organization.
#[derive(Debug)]
pub struct Importer<'a> {
    registry: &'a ResourceRegistry,
    source: &'a ApiClient,
    filters: &'a FilterSet,
    limiter: Arc<Semaphore>,
}

impl<'a> Importer<'a> {
    /// Creates an importer.
    #[must_use]
    pub const fn new(
        registry: &'a ResourceRegistry,
        source: &'a ApiClient,
        filters: &'a FilterSet,
        limiter: Arc<Semaphore>,
    ) -> Self {
        Self {
            registry,
            source,
            filters,
            limiter,
        }
    }

    /// Imports `types` and replaces their source state.
    ///
    /// A type whose listing fails keeps its previous source state.
    ///
    /// # Errors
    ///
    /// Returns an error only if the worker pool is shut down.
    pub async fn run(&self, state: &mut State, types: &[String], summary: &mut RunSummary) -> Result<()> {
        let imports = join_all(
            types
                .iter()
                .filter_map(|ty| self.registry.get(ty).cloned())
                .map(|resource| self.import_type(resource)),
        )
        .await;

        for import in imports {
            let import = import?;
            let entry = summary.entry(&import.resource_type);
            entry.failed += import.failed;

            match import.listed {
                Some(resources) => {
                    info!("Imported {} {} resources", resources.len(), import.resource_type);
                    entry.imported += resources.len();
                    state.set_map(Origin::Source, &import.resource_type, resources);
                }
                None => warn!("Keeping previous source state for {}", import.resource_type),
            }
        }

        Ok(())
    }

    async fn import_type(&self, resource: Arc<dyn ResourceType>) -> Result<TypeImport> {
        let resource_type = resource.name().to_string();

        let listed = {
            let _permit = self.limiter.acquire().await.map_err(|_| ApplyError::WorkersClosed)?;
            resource.get_resources(self.source).await
        };

        let listed = match listed {
            Ok(listed) => listed,
            Err(e) => {
                error!("Error listing {resource_type}: {e}");
                return Ok(TypeImport {
                    resource_type,
                    listed: None,
                    failed: 1,
                });
            }
        };

        let mut in_flight: FuturesUnordered<_> = listed
            .into_iter()
            .filter(|body| self.filters.is_match(&resource_type, body))
            .map(|body| self.import_one(resource.as_ref(), body))
            .collect();

        let mut resources = ResourceMap::new();
        let mut failed = 0;
        while let Some(done) = in_flight.next().await {
            match done? {
                Ok((id, body)) => {
                    resources.insert(id, body);
                }
                Err(e) => {
                    error!("Error importing {resource_type}: {e}");
                    failed += 1;
                }
            }
        }

        Ok(TypeImport {
            resource_type,
            listed: Some(resources),
            failed,
        })
    }

    /// The outer result is fatal, the inner one is a per-resource failure.
    async fn import_one(&self, resource: &dyn ResourceType, body: Value) -> Result<Result<(String, Value)>> {
        let _permit = self.limiter.acquire().await.map_err(|_| ApplyError::WorkersClosed)?;
        Ok(resource.import_resource(self.source, None, Some(body)).await)
    }
}
