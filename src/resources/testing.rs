//! In-memory resource type for engine tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::client::ApiClient;
use crate::error::{ClientError, ResourceError, Result};

use super::contract::{Connection, ResourceType, ResourceTypeConfig};

/// Client for fakes; never contacted.
pub fn offline_client() -> ApiClient {
    ApiClient::new(&crate::client::ClientSettings {
        base_url: "http://127.0.0.1:9".to_string(),
        ..crate::client::ClientSettings::default()
    })
    .expect("client")
}

/// Settings for engine tests: sync, no filters, no tag, default policies.
pub fn test_config() -> crate::config::SyncConfig {
    crate::config::SyncConfig {
        command: crate::config::Command::Sync,
        source: crate::client::ClientSettings::default(),
        destination: crate::client::ClientSettings::default(),
        resources: Vec::new(),
        max_workers: crate::config::DEFAULT_MAX_WORKERS,
        cleanup: crate::config::CleanupPolicy::Off,
        missing_dependencies: crate::config::MissingDependencyPolicy::Fail,
        skip_failed_resource_connections: false,
        filters: crate::filter::FilterSet::default(),
        validate: false,
        source_resources_path: crate::state::DEFAULT_SOURCE_PATH.into(),
        destination_resources_path: crate::state::DEFAULT_DESTINATION_PATH.into(),
        sync_tag: None,
    }
}

/// In-flight call counter shared by several fakes.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

fn leak(s: &str) -> &'static str {
    Box::leak(s.to_string().into_boxed_str())
}

/// Resource type backed by a vector, counting every call.
pub struct FakeResource {
    config: ResourceTypeConfig,
    listing: Vec<Value>,
    delay: Duration,
    fail_ids: HashSet<String>,
    delete_status: Option<u16>,
    creates: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
    imports_by_id: AtomicUsize,
    gauge: Gauge,
    shared: Option<Arc<Gauge>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeResource {
    pub fn new(name: &str) -> Self {
        Self {
            config: ResourceTypeConfig::new(leak(name), "/fake"),
            listing: Vec::new(),
            delay: Duration::ZERO,
            fail_ids: HashSet::new(),
            delete_status: None,
            creates: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            imports_by_id: AtomicUsize::new(0),
            gauge: Gauge::default(),
            shared: None,
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_connections(mut self, connections: &[(&str, &str)]) -> Self {
        let connections: Vec<Connection> = connections
            .iter()
            .map(|(path, target)| Connection::new(leak(path), leak(target)))
            .collect();
        self.config = self.config.connections(Box::leak(connections.into_boxed_slice()));
        self
    }

    pub fn with_excluded(mut self, paths: &[&str]) -> Self {
        let paths: Vec<&'static str> = paths.iter().map(|p| leak(p)).collect();
        self.config = self.config.excluded(Box::leak(paths.into_boxed_slice()));
        self
    }

    pub fn with_tagging(mut self, path: &str) -> Self {
        self.config = self.config.tagging(leak(path));
        self
    }

    pub fn with_supersedes(mut self, legacy: &str) -> Self {
        self.config = self.config.supersedes(leak(legacy));
        self
    }

    pub fn with_listing(mut self, listing: Vec<Value>) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Also counts this fake's calls on `gauge`.
    pub fn with_shared_gauge(mut self, gauge: Arc<Gauge>) -> Self {
        self.shared = Some(gauge);
        self
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.fail_ids.insert(id.to_string());
        self
    }

    pub fn with_delete_status(mut self, status: u16) -> Self {
        self.delete_status = Some(status);
        self
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn imports_by_id(&self) -> usize {
        self.imports_by_id.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.gauge.max()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("lock").clone()
    }

    /// Simulates one network call.
    async fn call(&self) {
        self.gauge.enter();
        if let Some(shared) = &self.shared {
            shared.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(shared) = &self.shared {
            shared.exit();
        }
        self.gauge.exit();
    }

    async fn work(&self, id: &str) -> Result<()> {
        self.call().await;
        if self.fail_ids.contains(id) {
            return Err(ClientError::http(400, format!("{id} rejected")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceType for FakeResource {
    fn config(&self) -> &ResourceTypeConfig {
        &self.config
    }

    async fn get_resources(&self, _client: &ApiClient) -> Result<Vec<Value>> {
        Ok(self.listing.clone())
    }

    async fn import_resource(
        &self,
        _client: &ApiClient,
        id: Option<&str>,
        body: Option<Value>,
    ) -> Result<(String, Value)> {
        self.call().await;
        let body = match (body, id) {
            (Some(body), _) => body,
            (None, Some(id)) => {
                self.imports_by_id.fetch_add(1, Ordering::SeqCst);
                self.listing
                    .iter()
                    .find(|b| b["id"].as_str() == Some(id))
                    .cloned()
                    .ok_or_else(|| ClientError::http(404, format!("{id} not found")))?
            }
            (None, None) => return Err(ResourceError::unexpected(self.config.resource_type, "nothing to import").into()),
        };
        let id = body["id"].as_str().unwrap_or_default().to_string();
        Ok((id, body))
    }

    async fn create_resource(&self, _client: &ApiClient, id: &str, mut body: Value) -> Result<(String, Value)> {
        self.work(id).await?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        body["id"] = json!(format!("dest-{id}"));
        Ok((id.to_string(), body))
    }

    async fn update_resource(
        &self,
        _client: &ApiClient,
        id: &str,
        mut body: Value,
        current: &Value,
    ) -> Result<(String, Value)> {
        self.work(id).await?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        body["id"] = current["id"].clone();
        Ok((id.to_string(), body))
    }

    async fn delete_resource(&self, _client: &ApiClient, id: &str, _current: &Value) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = self.delete_status {
            return Err(ClientError::http(status, "gone").into());
        }
        self.deleted.lock().expect("lock").push(id.to_string());
        Ok(())
    }
}
