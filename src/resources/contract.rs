//! The contract every resource type implements.
//!
//! A resource type knows how to list, import, create, update and delete its
//! resources through the Datadog API, and how to rewrite identifiers of other
//! resources embedded in its bodies.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::body::id_string;
use crate::client::ApiClient;
use crate::error::{ResourceError, Result};
use crate::state::{Origin, ResourceMap, State};

use super::registry::ResourceRegistry;

/// An embedded reference from one resource type to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// Dotted path of the field holding the foreign identifier(s).
    pub path: &'static str,
    /// Resource type the identifier points to.
    pub target: &'static str,
}

impl Connection {
    /// Creates a connection descriptor.
    #[must_use]
    pub const fn new(path: &'static str, target: &'static str) -> Self {
        Self { path, target }
    }
}

/// Static description of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTypeConfig {
    /// Type key, e.g. `monitors`.
    pub resource_type: &'static str,
    /// API path of the collection.
    pub base_path: &'static str,
    /// Field of destination bodies holding their identifier.
    pub id_field: &'static str,
    /// Paths stripped before diffing, creating and updating.
    pub excluded_attributes: &'static [&'static str],
    /// Outbound references to other types.
    pub connections: &'static [Connection],
    /// Path of the tag list the sync tag is added to.
    pub tagging_path: Option<&'static str>,
    /// Legacy type this type replaces.
    pub supersedes: Option<&'static str>,
}

impl ResourceTypeConfig {
    /// Creates a config with an `id` identifier field and nothing else declared.
    #[must_use]
    pub const fn new(resource_type: &'static str, base_path: &'static str) -> Self {
        Self {
            resource_type,
            base_path,
            id_field: "id",
            excluded_attributes: &[],
            connections: &[],
            tagging_path: None,
            supersedes: None,
        }
    }

    /// Sets the identifier field of destination bodies.
    #[must_use]
    pub const fn id_field(mut self, field: &'static str) -> Self {
        self.id_field = field;
        self
    }

    /// Sets the excluded attribute paths.
    #[must_use]
    pub const fn excluded(mut self, paths: &'static [&'static str]) -> Self {
        self.excluded_attributes = paths;
        self
    }

    /// Sets the outbound connections.
    #[must_use]
    pub const fn connections(mut self, connections: &'static [Connection]) -> Self {
        self.connections = connections;
        self
    }

    /// Sets the tag list path.
    #[must_use]
    pub const fn tagging(mut self, path: &'static str) -> Self {
        self.tagging_path = Some(path);
        self
    }

    /// Declares the legacy type this type replaces.
    #[must_use]
    pub const fn supersedes(mut self, legacy: &'static str) -> Self {
        self.supersedes = Some(legacy);
        self
    }

    /// Returns the distinct types this type references.
    #[must_use]
    pub fn targets(&self) -> Vec<&'static str> {
        let mut targets: Vec<&'static str> = self.connections.iter().map(|c| c.target).collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }

    /// Returns the destination identifier of `current`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body has no usable identifier field.
    pub fn destination_id(&self, current: &Value) -> Result<String> {
        current
            .get(self.id_field)
            .and_then(id_string)
            .ok_or_else(|| ResourceError::missing_field(self.resource_type, self.id_field).into())
    }

    /// Returns the path of one member of the collection.
    #[must_use]
    pub fn item_path(&self, id: &str) -> String {
        format!("{}/{id}", self.base_path)
    }
}

/// Read-only view handed to [`ResourceType::connect_id`].
#[derive(Clone, Copy)]
pub struct ConnectContext<'a> {
    /// Current state of both origins.
    pub state: &'a State,
    /// Every registered type.
    pub registry: &'a ResourceRegistry,
}

impl<'a> ConnectContext<'a> {
    /// Creates a context.
    #[must_use]
    pub const fn new(state: &'a State, registry: &'a ResourceRegistry) -> Self {
        Self { state, registry }
    }

    /// Destination resources of a type, keyed by source identifier.
    #[must_use]
    pub fn destination(&self, resource_type: &str) -> Option<&'a ResourceMap> {
        self.state.map(Origin::Destination, resource_type)
    }

    /// Identifier field of a type's destination bodies.
    #[must_use]
    pub fn id_field(&self, resource_type: &str) -> &'static str {
        self.registry
            .config(resource_type)
            .map_or("id", |c| c.id_field)
    }
}

/// Behaviour of one resource type.
///
/// `client` is the source organization for listing and importing and the
/// destination organization for everything else.
#[async_trait]
pub trait ResourceType: Send + Sync {
    /// Static description of the type.
    fn config(&self) -> &ResourceTypeConfig;

    /// Type key.
    fn name(&self) -> &'static str {
        self.config().resource_type
    }

    /// Lists every resource of the type.
    async fn get_resources(&self, client: &ApiClient) -> Result<Vec<Value>>;

    /// Normalizes a listed body, or fetches one resource by identifier when
    /// `body` is `None`. Returns the state key and the body to store.
    async fn import_resource(
        &self,
        client: &ApiClient,
        id: Option<&str>,
        body: Option<Value>,
    ) -> Result<(String, Value)>;

    /// Runs once before any resource of the type is applied.
    async fn pre_apply_hook(&self, _client: &ApiClient) -> Result<()> {
        Ok(())
    }

    /// Runs before each create or update.
    async fn pre_resource_action_hook(&self, _id: &str, _body: &mut Value) -> Result<()> {
        Ok(())
    }

    /// Creates the resource. Returns the state key and the destination body.
    async fn create_resource(&self, client: &ApiClient, id: &str, body: Value) -> Result<(String, Value)>;

    /// Updates a resource that already exists in the destination.
    async fn update_resource(
        &self,
        client: &ApiClient,
        id: &str,
        body: Value,
        current: &Value,
    ) -> Result<(String, Value)>;

    /// Deletes a destination resource.
    async fn delete_resource(&self, client: &ApiClient, id: &str, current: &Value) -> Result<()>;

    /// Rewrites the identifiers held by `parent[key]` into destination
    /// identifiers of `target`. Returns the values that could not be resolved.
    fn connect_id(
        &self,
        key: &str,
        parent: &mut Map<String, Value>,
        target: &str,
        ctx: &ConnectContext<'_>,
    ) -> Vec<String> {
        default_connect_id(key, parent, target, ctx)
    }
}

/// Looks every identifier held by `parent[key]` up in the destination
/// mapping of `target` and rewrites it to the destination identifier.
#[must_use]
pub fn default_connect_id(
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
            let Some(raw) = id_string(v) else {
                return;
            };
            match destination.and_then(|m| m.get(&raw)).and_then(|b| b.get(id_field)) {
                Some(new_id) => *v = rewrite_id(v, new_id),
                None => unresolved.push(raw),
            }
        });
    }

    unresolved
}

/// Applies `f` to a value, or to each element when it is a sequence.
pub fn for_each_scalar<F>(value: &mut Value, mut f: F)
where
    F: FnMut(&mut Value),
{
    match value {
        Value::Array(items) => items.iter_mut().for_each(&mut f),
        other => f(other),
    }
}

/// Builds the replacement for `original`, keeping its scalar kind.
#[must_use]
pub fn rewrite_id(original: &Value, new_id: &Value) -> Value {
    match original {
        Value::Number(_) => match new_id {
            Value::String(s) => s.parse::<i64>().map_or_else(|_| new_id.clone(), Value::from),
            other => other.clone(),
        },
        _ => id_string(new_id).map_or_else(|| new_id.clone(), Value::String),
    }
}
