//! `synthetics_tests` (`/api/v1/synthetics/tests`).
//!
//! Tests are keyed by `publicId#monitorId` in state, since the public id alone
//! is reused across organizations. They reference private locations, global
//! variables, roles and other tests (multistep API tests call subtests).

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

use crate::body::id_string;
use crate::client::ApiClient;
use crate::error::{ResourceError, Result};

use super::contract::{
    default_connect_id, for_each_scalar, rewrite_id, ConnectContext, Connection, ResourceType,
    ResourceTypeConfig,
};

const EXCLUDED: &[&str] = &[
    "deleted_at",
    "org_id",
    "public_id",
    "monitor_id",
    "modified_at",
    "created_at",
    "creator",
    "created_by",
    "modified_by",
    "overall_state",
    "overall_state_modified",
    "stepCount",
];

const CONNECTIONS: &[Connection] = &[
    Connection::new("steps.params.subtestPublicId", "synthetics_tests"),
    Connection::new("locations", "synthetics_private_locations"),
    Connection::new("config.configVariables.id", "synthetics_global_variables"),
    Connection::new("options.restricted_roles", "roles"),
];

/// Type config.
pub const CONFIG: ResourceTypeConfig = ResourceTypeConfig::new("synthetics_tests", "/api/v1/synthetics/tests")
    .id_field("public_id")
    .excluded(EXCLUDED)
    .connections(CONNECTIONS)
    .tagging("tags");

/// Private location identifiers. Managed locations such as
/// `aws:eu-central-1` exist in every organization under the same name.
#[allow(clippy::expect_used)]
pub static PRIVATE_LOCATION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^pl:.*").expect("valid private location pattern"));

/// Resolves bare test public ids against the composite keys of the
/// destination `synthetics_tests` mapping.
#[must_use]
pub fn connect_test_public_id(key: &str, parent: &mut Map<String, Value>, ctx: &ConnectContext<'_>) -> Vec<String> {
    let destination = ctx.destination(CONFIG.resource_type);
    let mut unresolved = Vec::new();

    if let Some(value) = parent.get_mut(key) {
        for_each_scalar(value, |v| {
            let Some(public_id) = id_string(v) else {
                return;
            };
            let composite_prefix = format!("{public_id}#");
            let found = destination.and_then(|m| {
                m.iter()
                    .find(|(k, _)| **k == public_id || k.starts_with(&composite_prefix))
                    .and_then(|(_, body)| body.get(CONFIG.id_field))
            });
            match found {
                Some(new_id) => *v = rewrite_id(v, new_id),
                None => unresolved.push(public_id),
            }
        });
    }

    unresolved
}

/// Resolves private location references, leaving managed locations untouched.
fn connect_private_locations(
    key: &str,
    parent: &mut Map<String, Value>,
    target: &str,
    ctx: &ConnectContext<'_>,
) -> Vec<String> {
    let destination = ctx.destination(target);
    let id_field = ctx.id_field(target);
    let mut unresolved = Vec::new();

    if let Some(value) = parent.get_mut(key) {
        for_each_scalar(value, |v| {
            let Some(location) = v.as_str().map(str::to_string) else {
                return;
            };
            if !PRIVATE_LOCATION_ID.is_match(&location) {
                return;
            }
            match destination.and_then(|m| m.get(&location)).and_then(|b| b.get(id_field)) {
                Some(new_id) => *v = rewrite_id(v, new_id),
                None => unresolved.push(location),
            }
        });
    }

    unresolved
}

/// Synthetic API, browser and mobile tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticsTests;

impl SyntheticsTests {
    /// Creates the resource type.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn detail_path(kind: &str, public_id: &str) -> String {
        format!("{}/{kind}/{public_id}", CONFIG.base_path)
    }

    async fn fetch(client: &ApiClient, public_id: &str) -> Result<Value> {
        match client.get(&Self::detail_path("browser", public_id)).await {
            Ok(body) => Ok(body),
            Err(_) => client.get(&Self::detail_path("api", public_id)).await,
        }
    }

    fn state_key(body: &Value) -> Result<String> {
        let public_id = body
            .get("public_id")
            .and_then(id_string)
            .ok_or_else(|| ResourceError::missing_field(CONFIG.resource_type, "public_id"))?;
        let monitor_id = body
            .get("monitor_id")
            .and_then(id_string)
            .ok_or_else(|| ResourceError::missing_field(CONFIG.resource_type, "monitor_id"))?;
        Ok(format!("{public_id}#{monitor_id}"))
    }
}

#[async_trait]
impl ResourceType for SyntheticsTests {
    fn config(&self) -> &ResourceTypeConfig {
        &CONFIG
    }

    async fn get_resources(&self, client: &ApiClient) -> Result<Vec<Value>> {
        let response = client.get(CONFIG.base_path).await?;
        match response.get("tests") {
            Some(Value::Array(tests)) => Ok(tests.clone()),
            _ => Err(ResourceError::unexpected(CONFIG.resource_type, "missing 'tests' array").into()),
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
            (None, Some(id)) => {
                let public_id = id.split('#').next().unwrap_or(id);
                Self::fetch(client, public_id).await?
            }
            (None, None) => {
                return Err(ResourceError::unexpected(
                    CONFIG.resource_type,
                    "import needs an identifier or a body",
                )
                .into());
            }
        };

        let public_id = body
            .get("public_id")
            .and_then(id_string)
            .ok_or_else(|| ResourceError::missing_field(CONFIG.resource_type, "public_id"))?;

        let body = match body.get("type").and_then(Value::as_str) {
            Some(kind @ ("browser" | "api")) => client.get(&Self::detail_path(kind, &public_id)).await?,
            _ => body,
        };

        Ok((Self::state_key(&body)?, body))
    }

    async fn create_resource(&self, client: &ApiClient, id: &str, body: Value) -> Result<(String, Value)> {
        let response = client.post(CONFIG.base_path, &body).await?;
        Ok((id.to_string(), response))
    }

    async fn update_resource(
        &self,
        client: &ApiClient,
        id: &str,
        body: Value,
        current: &Value,
    ) -> Result<(String, Value)> {
        let public_id = CONFIG.destination_id(current)?;
        let response = client.put(&CONFIG.item_path(&public_id), &body).await?;
        Ok((id.to_string(), response))
    }

    async fn delete_resource(&self, client: &ApiClient, _id: &str, current: &Value) -> Result<()> {
        let public_id = CONFIG.destination_id(current)?;
        client
            .post(&format!("{}/delete", CONFIG.base_path), &json!({ "public_ids": [public_id] }))
            .await?;
        Ok(())
    }

    fn connect_id(
        &self,
        key: &str,
        parent: &mut Map<String, Value>,
        target: &str,
        ctx: &ConnectContext<'_>,
    ) -> Vec<String> {
        match target {
            "synthetics_private_locations" => connect_private_locations(key, parent, target, ctx),
            "synthetics_tests" => connect_test_public_id(key, parent, ctx),
            _ => default_connect_id(key, parent, target, ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientSettings;
    use crate::resources::ResourceRegistry;
    use crate::state::{Origin, State};
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn connect(body: &mut Value, key: &str, target: &str, state: &State) -> Vec<String> {
        let registry = ResourceRegistry::with_defaults();
        let ctx = ConnectContext::new(state, &registry);
        let parent = body.as_object_mut().expect("object");
        SyntheticsTests::new().connect_id(key, parent, target, &ctx)
    }

    #[test]
    fn test_private_location_is_rewritten() {
        let mut state = State::new();
        state.insert(
            Origin::Destination,
            "synthetics_private_locations",
            "pl:abc",
            json!({"id": "dest-123"}),
        );

        let mut body = json!({"locations": ["pl:abc", "aws:eu-central-1"]});
        let unresolved = connect(&mut body, "locations", "synthetics_private_locations", &state);

        assert!(unresolved.is_empty());
        assert_eq!(body, json!({"locations": ["dest-123", "aws:eu-central-1"]}));
    }

    #[test]
    fn test_missing_private_location_is_reported() {
        let mut body = json!({"locations": ["pl:abc"]});
        let unresolved = connect(&mut body, "locations", "synthetics_private_locations", &State::new());

        assert_eq!(unresolved, vec!["pl:abc".to_string()]);
        assert_eq!(body, json!({"locations": ["pl:abc"]}));
    }

    #[test]
    fn test_subtest_prefix_match() {
        let mut state = State::new();
        state.insert(
            Origin::Destination,
            "synthetics_tests",
            "abc-def-ghi#1234",
            json!({"public_id": "xyz-uvw-rst", "monitor_id": 5678}),
        );

        let mut step = json!({"subtestPublicId": "abc-def-ghi"});
        let unresolved = connect(&mut step, "subtestPublicId", "synthetics_tests", &state);

        assert!(unresolved.is_empty());
        assert_eq!(step["subtestPublicId"], "xyz-uvw-rst");

        let mut other = json!({"subtestPublicId": "abc"});
        assert_eq!(
            connect(&mut other, "subtestPublicId", "synthetics_tests", &state),
            vec!["abc".to_string()]
        );
    }

    #[tokio::test]
    async fn test_import_fetches_detail_and_builds_composite_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/synthetics/tests/api/abc-def-ghi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "abc-def-ghi", "monitor_id": 42, "type": "api", "config": {"assertions": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&ClientSettings {
            base_url: server.uri(),
            ..ClientSettings::default()
        })
        .expect("client");

        let listed = json!({"public_id": "abc-def-ghi", "monitor_id": 42, "type": "api"});
        let (id, body) = SyntheticsTests::new()
            .import_resource(&client, None, Some(listed))
            .await
            .expect("import");

        assert_eq!(id, "abc-def-ghi#42");
        assert!(body.get("config").is_some());
    }

    #[tokio::test]
    async fn test_delete_posts_public_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/synthetics/tests/delete"))
            .and(body_json(json!({"public_ids": ["xyz-uvw-rst"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deleted_tests": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&ClientSettings {
            base_url: server.uri(),
            ..ClientSettings::default()
        })
        .expect("client");

        SyntheticsTests::new()
            .delete_resource(&client, "abc-def-ghi#42", &json!({"public_id": "xyz-uvw-rst"}))
            .await
            .expect("delete");
    }
}
