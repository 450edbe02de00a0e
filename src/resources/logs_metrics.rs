//! `logs_metrics`: metrics generated from logs (`/api/v2/logs/config/metrics`).
//!
//! The metric name is the identifier on both sides.

use super::contract::ResourceTypeConfig;
use super::rest::RestResource;

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("logs_metrics", "/api/v2/logs/config/metrics");

/// Builds the resource type.
#[must_use]
pub const fn resource() -> RestResource {
    RestResource::json_api(CONFIG)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiClient, ClientSettings};
    use crate::resources::ResourceType;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_import_by_name_unwraps_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/logs/config/metrics/errors.count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"id": "errors.count", "type": "logs_metrics", "attributes": {"compute": {"aggregation_type": "count"}}}
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&ClientSettings {
            base_url: server.uri(),
            ..ClientSettings::default()
        })
        .expect("client");

        let (id, body) = resource()
            .import_resource(&client, Some("errors.count"), None)
            .await
            .expect("import");
        assert_eq!(id, "errors.count");
        assert_eq!(body["attributes"]["compute"]["aggregation_type"], "count");
    }
}
