//! `logs_pipelines` (`/api/v1/logs/config/pipelines`).
//!
//! Integration pipelines are read-only and installed automatically, so they
//! cannot be created. Before applying, the destination's integration
//! pipelines are indexed by name and a source integration pipeline is mapped
//! onto its destination twin instead of being posted.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::body::id_string;
use crate::client::ApiClient;
use crate::error::{ResourceError, Result};

use super::contract::{ResourceType, ResourceTypeConfig};

const EXCLUDED: &[&str] = &["id", "type"];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("logs_pipelines", "/api/v1/logs/config/pipelines")
    .excluded(EXCLUDED)
    .supersedes("logs_custom_pipelines");

fn is_read_only(pipeline: &Value) -> bool {
    pipeline.get("is_read_only").and_then(Value::as_bool).unwrap_or(false)
}

/// Log pipelines, custom and integration.
#[derive(Debug, Default)]
pub struct LogsPipelines {
    /// Destination integration pipelines by name.
    integration_pipelines: RwLock<HashMap<String, Value>>,
}

impl LogsPipelines {
    /// Creates the resource type.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceType for LogsPipelines {
    fn config(&self) -> &ResourceTypeConfig {
        &CONFIG
    }

    async fn get_resources(&self, client: &ApiClient) -> Result<Vec<Value>> {
        match client.get(CONFIG.base_path).await? {
            Value::Array(pipelines) => Ok(pipelines),
            _ => Err(ResourceError::unexpected(CONFIG.resource_type, "listing is not an array").into()),
        }
    }

    async fn import_resource(
        &self,
        client: &ApiClient,
        id: Option<&str>,
        body: Option<Value>,
    ) -> Result<(String, Value)> {
        let body = match (body, id) {
            (Some(body), _) => body,
            (None, Some(id)) => client.get(&CONFIG.item_path(id)).await?,
            (None, None) => {
                return Err(ResourceError::unexpected(
                    CONFIG.resource_type,
                    "import needs an identifier or a body",
                )
                .into());
            }
        };

        let id = body
            .get("id")
            .and_then(id_string)
            .ok_or_else(|| ResourceError::missing_field(CONFIG.resource_type, "id"))?;
        Ok((id, body))
    }

    async fn pre_apply_hook(&self, client: &ApiClient) -> Result<()> {
        let pipelines = self.get_resources(client).await?;
        let by_name: HashMap<String, Value> = pipelines
            .into_iter()
            .filter(is_read_only)
            .filter_map(|p| {
                let name = p.get("name").and_then(Value::as_str)?.to_string();
                Some((name, p))
            })
            .collect();

        debug!("Indexed {} destination integration pipelines", by_name.len());
        *self.integration_pipelines.write().await = by_name;
        Ok(())
    }

    async fn create_resource(&self, client: &ApiClient, id: &str, mut body: Value) -> Result<(String, Value)> {
        if is_read_only(&body) {
            let name = body.get("name").and_then(Value::as_str).unwrap_or_default();
            return match self.integration_pipelines.read().await.get(name) {
                Some(existing) => {
                    debug!("Mapped integration pipeline '{name}' onto its destination twin");
                    Ok((id.to_string(), existing.clone()))
                }
                None => Err(ResourceError::unexpected(
                    CONFIG.resource_type,
                    format!("integration pipeline '{name}' is not installed in the destination"),
                )
                .into()),
            };
        }

        if let Value::Object(map) = &mut body {
            map.remove("is_read_only");
        }
        let response = client.post(CONFIG.base_path, &body).await?;
        Ok((id.to_string(), response))
    }

    async fn update_resource(
        &self,
        client: &ApiClient,
        id: &str,
        mut body: Value,
        current: &Value,
    ) -> Result<(String, Value)> {
        let destination_id = CONFIG.destination_id(current)?;
        if let Value::Object(map) = &mut body {
            map.remove("is_read_only");
        }
        let response = client.put(&CONFIG.item_path(&destination_id), &body).await?;
        Ok((id.to_string(), response))
    }

    async fn delete_resource(&self, client: &ApiClient, id: &str, current: &Value) -> Result<()> {
        if is_read_only(current) {
            debug!("Leaving integration pipeline {id} in place");
            return Ok(());
        }
        let destination_id = CONFIG.destination_id(current)?;
        client.delete(&CONFIG.item_path(&destination_id)).await?;
        Ok(())
    }
}
