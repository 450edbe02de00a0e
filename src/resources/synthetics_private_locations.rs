//! `synthetics_private_locations` (`/api/v1/synthetics/private-locations`).
//!
//! Private locations are listed through the shared locations endpoint, which
//! also returns the managed locations; only `pl:` identifiers are kept and
//! fetched in full.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use crate::body::id_string;
use crate::client::ApiClient;
use crate::error::{ResourceError, Result};

use super::contract::{ResourceType, ResourceTypeConfig};
use super::synthetics_tests::PRIVATE_LOCATION_ID;

const EXCLUDED: &[&str] = &["id", "modifiedAt", "createdAt", "metadata", "secrets", "config"];

/// Type config.
pub const CONFIG: ResourceTypeConfig =
    ResourceTypeConfig::new("synthetics_private_locations", "/api/v1/synthetics/private-locations")
        .excluded(EXCLUDED);

/// Endpoint listing managed and private locations together.
const LOCATIONS_PATH: &str = "/api/v1/synthetics/locations";

/// Synthetic private locations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticsPrivateLocations;

impl SyntheticsPrivateLocations {
    /// Creates the resource type.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ResourceType for SyntheticsPrivateLocations {
    fn config(&self) -> &ResourceTypeConfig {
        &CONFIG
    }

    async fn get_resources(&self, client: &ApiClient) -> Result<Vec<Value>> {
        let response = match client.get(LOCATIONS_PATH).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Error listing {}: {e}", CONFIG.resource_type);
                return Ok(Vec::new());
            }
        };

        let locations = response
            .get("locations")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(locations
            .into_iter()
            .filter(|l| {
                l.get("id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| PRIVATE_LOCATION_ID.is_match(id))
            })
            .collect())
    }

    async fn import_resource(
        &self,
        client: &ApiClient,
        id: Option<&str>,
        body: Option<Value>,
    ) -> Result<(String, Value)> {
        let id = match (id, &body) {
            (Some(id), _) => id.to_string(),
            (None, Some(body)) => body
                .get("id")
                .and_then(id_string)
                .ok_or_else(|| ResourceError::missing_field(CONFIG.resource_type, "id"))?,
            (None, None) => {
                return Err(ResourceError::unexpected(
                    CONFIG.resource_type,
                    "import needs an identifier or a body",
                )
                .into());
            }
        };

        if !PRIVATE_LOCATION_ID.is_match(&id) {
            return Err(ResourceError::Unsupported {
                resource_type: CONFIG.resource_type.to_string(),
                operation: format!("importing managed location {id}"),
            }
            .into());
        }

        let detail = client.get(&CONFIG.item_path(&id)).await?;
        Ok((id, detail))
    }

    async fn create_resource(&self, client: &ApiClient, id: &str, body: Value) -> Result<(String, Value)> {
        let mut response = client.post(CONFIG.base_path, &body).await?;
        let created = match response.get_mut("private_location").map(Value::take) {
            Some(location) => location,
            None => response,
        };
        Ok((id.to_string(), created))
    }

    async fn update_resource(
        &self,
        client: &ApiClient,
        id: &str,
        body: Value,
        current: &Value,
    ) -> Result<(String, Value)> {
        let destination_id = CONFIG.destination_id(current)?;
        let response = client.put(&CONFIG.item_path(&destination_id), &body).await?;

        let mut merged: Map<String, Value> = current.as_object().cloned().unwrap_or_default();
        if let Value::Object(updated) = response {
            merged.extend(updated);
        }
        Ok((id.to_string(), Value::Object(merged)))
    }

    async fn delete_resource(&self, client: &ApiClient, _id: &str, current: &Value) -> Result<()> {
        let destination_id = CONFIG.destination_id(current)?;
        client.delete(&CONFIG.item_path(&destination_id)).await?;
        Ok(())
    }
}
