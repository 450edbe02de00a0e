//! `metric_tag_configurations`: the queryable tag keys of custom metrics
//! (`/api/v2/metrics/{metric}/tags`).
//!
//! The metric name is the identifier on both sides. Only metrics with a
//! configuration are listed.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::body::id_string;
use crate::client::ApiClient;
use crate::error::{ResourceError, Result};

use super::contract::{ResourceType, ResourceTypeConfig};

const EXCLUDED: &[&str] = &["attributes.created_at", "attributes.modified_at"];

/// Type config.
pub const CONFIG: ResourceTypeConfig =
    ResourceTypeConfig::new("metric_tag_configurations", "/api/v2/metrics").excluded(EXCLUDED);

/// Metric tag configurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricTagConfigurations;

impl MetricTagConfigurations {
    /// Creates the resource type.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn tags_path(metric: &str) -> String {
        format!("{}/tags", CONFIG.item_path(metric))
    }

    fn data(response: Value) -> Result<Value> {
        match response {
            Value::Object(mut map) => map
                .remove("data")
                .ok_or_else(|| ResourceError::missing_field(CONFIG.resource_type, "data").into()),
            _ => Err(ResourceError::unexpected(CONFIG.resource_type, "response is not an object").into()),
        }
    }
}

#[async_trait]
impl ResourceType for MetricTagConfigurations {
    fn config(&self) -> &ResourceTypeConfig {
        &CONFIG
    }

    async fn get_resources(&self, client: &ApiClient) -> Result<Vec<Value>> {
        let response = client
            .get_with_query(CONFIG.base_path, &[("filter[configured]", "true".to_string())])
            .await?;
        Ok(response
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn import_resource(
        &self,
        client: &ApiClient,
        id: Option<&str>,
        body: Option<Value>,
    ) -> Result<(String, Value)> {
        let body = match (id, body) {
            (Some(metric), _) => Self::data(client.get(&Self::tags_path(metric)).await?)?,
            (None, Some(body)) => body,
            (None, None) => {
                return Err(ResourceError::unexpected(
                    CONFIG.resource_type,
                    "import needs an identifier or a body",
                )
                .into());
            }
        };

        let metric = body
            .get("id")
            .and_then(id_string)
            .ok_or_else(|| ResourceError::missing_field(CONFIG.resource_type, "id"))?;
        Ok((metric, body))
    }

    async fn create_resource(&self, client: &ApiClient, id: &str, body: Value) -> Result<(String, Value)> {
        let response = client.post(&Self::tags_path(id), &json!({ "data": body })).await?;
        Ok((id.to_string(), Self::data(response)?))
    }

    async fn update_resource(
        &self,
        client: &ApiClient,
        id: &str,
        mut body: Value,
        current: &Value,
    ) -> Result<(String, Value)> {
        // The metric type of an existing configuration cannot be patched.
        if let Some(attributes) = body.get_mut("attributes").and_then(Value::as_object_mut) {
            attributes.remove("metric_type");
        }
        let metric = CONFIG.destination_id(current)?;
        let response = client.patch(&Self::tags_path(&metric), &json!({ "data": body })).await?;
        Ok((id.to_string(), Self::data(response)?))
    }

    async fn delete_resource(&self, client: &ApiClient, _id: &str, current: &Value) -> Result<()> {
        let metric = CONFIG.destination_id(current)?;
        client.delete(&Self::tags_path(&metric)).await?;
        Ok(())
    }
}
