//! In-memory state types.
//!
//! The state holds two parallel mappings, one per origin, each keyed by
//! resource type and then by identifier. It is loaded fully when a command
//! starts and written back when a phase ends.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

use crate::error::Result;

use super::store::StateStore;

/// Identifier to body mapping for one resource type.
pub type ResourceMap = BTreeMap<String, Value>;

/// Which organization a body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The organization resources are copied from.
    Source,
    /// The organization resources are copied to.
    Destination,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// Source and destination resources for every loaded type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    source: HashMap<String, ResourceMap>,
    destination: HashMap<String, ResourceMap>,
}

impl State {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads both origins for the given types.
    ///
    /// # Errors
    ///
    /// Returns an error if a state file exists but cannot be read.
    pub async fn load<S: StateStore + ?Sized>(store: &S, types: &[String]) -> Result<Self> {
        let mut state = Self::new();
        for ty in types {
            for origin in [Origin::Source, Origin::Destination] {
                let map = store.load(origin, ty).await?;
                debug!("Loaded {} {origin} {ty} resources", map.len());
                state.set_map(origin, ty, map);
            }
        }
        Ok(state)
    }

    /// Writes one origin for the given types back to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if a state file cannot be written.
    pub async fn persist<S: StateStore + ?Sized>(
        &self,
        store: &S,
        origin: Origin,
        types: &[String],
    ) -> Result<()> {
        let empty = ResourceMap::new();
        for ty in types {
            let map = self.map(origin, ty).unwrap_or(&empty);
            store.save(origin, ty, map).await?;
        }
        Ok(())
    }

    fn side(&self, origin: Origin) -> &HashMap<String, ResourceMap> {
        match origin {
            Origin::Source => &self.source,
            Origin::Destination => &self.destination,
        }
    }

    fn side_mut(&mut self, origin: Origin) -> &mut HashMap<String, ResourceMap> {
        match origin {
            Origin::Source => &mut self.source,
            Origin::Destination => &mut self.destination,
        }
    }

    /// Returns the mapping of one type, if it was loaded.
    #[must_use]
    pub fn map(&self, origin: Origin, ty: &str) -> Option<&ResourceMap> {
        self.side(origin).get(ty)
    }

    /// Returns the mapping of one type, creating it if needed.
    pub fn map_mut(&mut self, origin: Origin, ty: &str) -> &mut ResourceMap {
        self.side_mut(origin).entry(ty.to_string()).or_default()
    }

    /// Replaces the mapping of one type.
    pub fn set_map(&mut self, origin: Origin, ty: &str, map: ResourceMap) {
        self.side_mut(origin).insert(ty.to_string(), map);
    }

    /// Returns one body.
    #[must_use]
    pub fn get(&self, origin: Origin, ty: &str, id: &str) -> Option<&Value> {
        self.map(origin, ty).and_then(|m| m.get(id))
    }

    /// Returns true if the identifier is known for the type.
    #[must_use]
    pub fn contains(&self, origin: Origin, ty: &str, id: &str) -> bool {
        self.get(origin, ty, id).is_some()
    }

    /// Inserts or replaces one body.
    pub fn insert(&mut self, origin: Origin, ty: &str, id: impl Into<String>, body: Value) {
        self.map_mut(origin, ty).insert(id.into(), body);
    }

    /// Removes one body.
    pub fn remove(&mut self, origin: Origin, ty: &str, id: &str) -> Option<Value> {
        self.side_mut(origin).get_mut(ty).and_then(|m| m.remove(id))
    }

    /// Returns the `(type, id)` pairs present in the destination but no
    /// longer present in the source, in the order of `types`.
    #[must_use]
    pub fn resources_to_cleanup(&self, types: &[String]) -> Vec<(String, String)> {
        let mut orphans = Vec::new();
        for ty in types {
            let Some(destination) = self.map(Origin::Destination, ty) else {
                continue;
            };
            for id in destination.keys() {
                if !self.contains(Origin::Source, ty, id) {
                    orphans.push((ty.clone(), id.clone()));
                }
            }
        }
        orphans
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cleanup_set_is_destination_minus_source() {
        let mut state = State::new();
        state.insert(Origin::Source, "monitors", "1", json!({"id": 1}));
        state.insert(Origin::Destination, "monitors", "1", json!({"id": 101}));
        state.insert(Origin::Destination, "monitors", "2", json!({"id": 102}));
        state.insert(Origin::Destination, "roles", "r1", json!({"id": "dr1"}));

        let orphans = state.resources_to_cleanup(&["monitors".to_string(), "roles".to_string()]);
        assert_eq!(
            orphans,
            vec![
                ("monitors".to_string(), "2".to_string()),
                ("roles".to_string(), "r1".to_string())
            ]
        );
    }

    #[test]
    fn test_remove_drops_only_the_given_entry() {
        let mut state = State::new();
        state.insert(Origin::Destination, "roles", "a", json!({}));
        state.insert(Origin::Destination, "roles", "b", json!({}));

        assert!(state.remove(Origin::Destination, "roles", "a").is_some());
        assert!(state.remove(Origin::Destination, "roles", "missing").is_none());
        assert!(!state.contains(Origin::Destination, "roles", "a"));
        assert!(state.contains(Origin::Destination, "roles", "b"));
    }

    #[test]
    fn test_origin_display() {
        assert_eq!(Origin::Source.to_string(), "source");
        assert_eq!(Origin::Destination.to_string(), "destination");
    }
}
