//! Generic implementation for plain REST collections.
//!
//! Most Datadog resources follow one of two conventions: the v1 style, where
//! bodies are sent and returned as-is, and the v2 JSON:API style, where they
//! travel inside a `{"data": ...}` envelope and updates use `PATCH`.
//! [`RestResource`] covers both, parameterized by a handful of switches.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::body::id_string;
use crate::client::ApiClient;
use crate::error::{ResourceError, Result};

use super::contract::{default_connect_id, ConnectContext, ResourceType, ResourceTypeConfig};

/// Page size used for paginated collections.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Custom reference resolution hook. Returning `None` falls back to the
/// default exact-match lookup.
pub type ConnectFn =
    fn(&str, &mut Map<String, Value>, &str, &ConnectContext<'_>) -> Option<Vec<String>>;

/// HTTP verb used to update a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateVerb {
    /// Full replacement.
    Put,
    /// Partial update.
    Patch,
}

/// A resource type served by a plain REST collection.
#[derive(Debug, Clone)]
pub struct RestResource {
    config: ResourceTypeConfig,
    list_key: Option<&'static str>,
    page_size: Option<usize>,
    envelope: bool,
    update_verb: UpdateVerb,
    fetch_detail: bool,
    list_filter: Option<fn(&Value) -> bool>,
    connect: Option<ConnectFn>,
}

impl RestResource {
    /// Creates a v1-style resource whose listing is a bare array.
    #[must_use]
    pub const fn new(config: ResourceTypeConfig) -> Self {
        Self {
            config,
            list_key: None,
            page_size: None,
            envelope: false,
            update_verb: UpdateVerb::Put,
            fetch_detail: false,
            list_filter: None,
            connect: None,
        }
    }

    /// Creates a v2 JSON:API resource.
    #[must_use]
    pub const fn json_api(config: ResourceTypeConfig) -> Self {
        Self::new(config)
            .list_key("data")
            .envelope()
            .update_verb(UpdateVerb::Patch)
    }

    /// Reads the listing from this key of the response object.
    #[must_use]
    pub const fn list_key(mut self, key: &'static str) -> Self {
        self.list_key = Some(key);
        self
    }

    /// Lists with page-number pagination.
    #[must_use]
    pub const fn paginated(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Wraps requests in and unwraps responses from `{"data": ...}`.
    #[must_use]
    pub const fn envelope(mut self) -> Self {
        self.envelope = true;
        self
    }

    /// Sets the update verb.
    #[must_use]
    pub const fn update_verb(mut self, verb: UpdateVerb) -> Self {
        self.update_verb = verb;
        self
    }

    /// Re-fetches each listed resource, for listings that return partial bodies.
    #[must_use]
    pub const fn fetch_detail(mut self) -> Self {
        self.fetch_detail = true;
        self
    }

    /// Keeps only listed bodies for which `filter` returns true.
    #[must_use]
    pub const fn list_filter(mut self, filter: fn(&Value) -> bool) -> Self {
        self.list_filter = Some(filter);
        self
    }

    /// Installs a custom reference resolution hook.
    #[must_use]
    pub const fn connect_with(mut self, connect: ConnectFn) -> Self {
        self.connect = Some(connect);
        self
    }

    /// Unwraps a response body. Envelopes holding a list yield their first item.
    fn unwrap_response(&self, response: Value) -> Result<Value> {
        if !self.envelope && self.list_key != Some("data") {
            return Ok(response);
        }

        match response {
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => items.into_iter().next().ok_or_else(|| {
                    ResourceError::unexpected(self.config.resource_type, "empty 'data' array in response")
                        .into()
                }),
                Some(data) => Ok(data),
                None => Ok(Value::Object(map)),
            },
            other => Ok(other),
        }
    }

    fn wrap_request(&self, body: Value) -> Value {
        if self.envelope {
            json!({ "data": body })
        } else {
            body
        }
    }

    fn state_id(&self, body: &Value) -> Result<String> {
        body.get(self.config.id_field)
            .and_then(id_string)
            .ok_or_else(|| ResourceError::missing_field(self.config.resource_type, self.config.id_field).into())
    }
}

#[async_trait]
impl ResourceType for RestResource {
    fn config(&self) -> &ResourceTypeConfig {
        &self.config
    }

    async fn get_resources(&self, client: &ApiClient) -> Result<Vec<Value>> {
        let items = match (self.page_size, self.list_key) {
            (Some(page_size), Some(key)) => {
                client.get_paginated(self.config.base_path, key, page_size).await?
            }
            (_, key) => {
                let response = client.get(self.config.base_path).await?;
                let listing = match key {
                    Some(key) => response.get(key).cloned().unwrap_or(Value::Null),
                    None => response,
                };
                match listing {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    _ => {
                        return Err(ResourceError::unexpected(
                            self.config.resource_type,
                            "listing is not an array",
                        )
                        .into());
                    }
                }
            }
        };

        Ok(match self.list_filter {
            Some(keep) => items.into_iter().filter(|item| keep(item)).collect(),
            None => items,
        })
    }

    async fn import_resource(
        &self,
        client: &ApiClient,
        id: Option<&str>,
        body: Option<Value>,
    ) -> Result<(String, Value)> {
        let body = match (body, id) {
            (Some(body), _) if !self.fetch_detail => body,
            (Some(body), _) => {
                let id = self.state_id(&body)?;
                self.unwrap_response(client.get(&self.config.item_path(&id)).await?)?
            }
            (None, Some(id)) => self.unwrap_response(client.get(&self.config.item_path(id)).await?)?,
            (None, None) => {
                return Err(ResourceError::unexpected(
                    self.config.resource_type,
                    "import needs an identifier or a body",
                )
                .into());
            }
        };

        let id = self.state_id(&body)?;
        Ok((id, body))
    }

    async fn create_resource(&self, client: &ApiClient, id: &str, body: Value) -> Result<(String, Value)> {
        let response = client.post(self.config.base_path, &self.wrap_request(body)).await?;
        Ok((id.to_string(), self.unwrap_response(response)?))
    }

    async fn update_resource(
        &self,
        client: &ApiClient,
        id: &str,
        mut body: Value,
        current: &Value,
    ) -> Result<(String, Value)> {
        let destination_id = self.config.destination_id(current)?;
        let path = self.config.item_path(&destination_id);

        if self.envelope {
            if let Value::Object(map) = &mut body {
                map.insert("id".to_string(), Value::String(destination_id.clone()));
            }
        }

        let payload = self.wrap_request(body);
        let response = match self.update_verb {
            UpdateVerb::Put => client.put(&path, &payload).await?,
            UpdateVerb::Patch => client.patch(&path, &payload).await?,
        };

        debug!("{}: updated {id} ({destination_id})", self.config.resource_type);
        Ok((id.to_string(), self.unwrap_response(response)?))
    }

    async fn delete_resource(&self, client: &ApiClient, _id: &str, current: &Value) -> Result<()> {
        let destination_id = self.config.destination_id(current)?;
        client.delete(&self.config.item_path(&destination_id)).await?;
        Ok(())
    }

    fn connect_id(
        &self,
        key: &str,
        parent: &mut Map<String, Value>,
        target: &str,
        ctx: &ConnectContext<'_>,
    ) -> Vec<String> {
        self.connect
            .and_then(|connect| connect(key, parent, target, ctx))
            .unwrap_or_else(|| default_connect_id(key, parent, target, ctx))
    }
}
