//! Shared real-time data store.
//!
//! The store is a tree of `/`-separated keys holding small values. Every
//! write is published to a `tokio::sync::broadcast` channel so that each
//! subscribed client can react to changes made by the others. Removing a
//! key removes its whole subtree.
//!
//! [`MemoryStore`] is the in-process implementation shared by all clients of
//! one process (and persisted with [`crate::persistence`]).

use std::collections::{BTreeMap, BTreeSet};

use blockworld_engine::world::position::ChunkPos;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// Capacity of the change channel. A subscriber that falls further behind
/// than this observes `Lagged` and must resync.
pub const CHANGE_CAPACITY: usize = 1024;

/// Client identifier used for presence keys and change attribution.
pub type ClientId = String;

/// Store paths.
pub mod paths {
    use super::ChunkPos;

    pub const WORLD: &str = "world";
    pub const SEED: &str = "world/seed";
    pub const SIZE: &str = "world/size";
    pub const PLAYERS: &str = "players";
    pub const CHARACTERS: &str = "characters";

    const CHUNK_PREFIX: &str = "world/chunk_";

    pub fn chunk(pos: ChunkPos) -> String {
        format!("{}{}_{}_{}", CHUNK_PREFIX, pos.x, pos.y, pos.z)
    }

    /// Inverse of [`chunk`].
    pub fn parse_chunk(key: &str) -> Option<ChunkPos> {
        let mut parts = key.strip_prefix(CHUNK_PREFIX)?.split('_');
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(ChunkPos::new(x, y, z))
    }

    pub fn player(id: &str) -> String {
        format!("{PLAYERS}/{id}")
    }

    pub fn character(id: &str) -> String {
        format!("{CHARACTERS}/{id}")
    }

    pub fn character_position(id: &str) -> String {
        format!("{CHARACTERS}/{id}/position")
    }
}

/// A leaf value in the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreValue {
    Int(i64),
    Bytes(Vec<u8>),
    Floats(Vec<f32>),
    Text(String),
}

impl StoreValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            StoreValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            StoreValue::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            StoreValue::Floats(v) => Some(v),
            _ => None,
        }
    }
}

/// Who made a change.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeSource {
    /// A connected client.
    Client(ClientId),
    /// The store itself (snapshot load, administrative reset).
    Store,
}

/// One key changed. `value` is `None` when the key was removed.
#[derive(Clone, Debug)]
pub struct StoreChange {
    pub key: String,
    pub value: Option<StoreValue>,
    pub source: ChangeSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("write to {key} rejected: {reason}")]
    Rejected { key: String, reason: String },
}

/// The operations the engine needs from a shared store.
///
/// Implementations must publish every successful write to subscribers,
/// including writes made through the same handle.
pub trait SharedStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError>;

    fn set(&self, key: &str, value: StoreValue, source: &ChangeSource) -> Result<(), StoreError>;

    /// Delete `key` and everything below it.
    fn remove(&self, key: &str, source: &ChangeSource) -> Result<(), StoreError>;

    /// Names of the direct children of `key`, sorted.
    fn children(&self, key: &str) -> Result<Vec<String>, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Lock-sharded in-memory store.
pub struct MemoryStore {
    entries: DashMap<String, StoreValue>,
    change_tx: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            entries: DashMap::new(),
            change_tx,
        }
    }

    /// Build a store from saved entries. No change events are published.
    pub fn from_entries(entries: BTreeMap<String, StoreValue>) -> Self {
        let store = Self::new();
        for (key, value) in entries {
            store.entries.insert(key, value);
        }
        store
    }

    /// Sorted copy of every entry.
    pub fn entries(&self) -> BTreeMap<String, StoreValue> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn publish(&self, key: String, value: Option<StoreValue>, source: &ChangeSource) {
        // No subscribers is fine.
        let _ = self.change_tx.send(StoreChange {
            key,
            value,
            source: source.clone(),
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn in_subtree(key: &str, root: &str) -> bool {
    key == root || key.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: StoreValue, source: &ChangeSource) -> Result<(), StoreError> {
        // A leaf cannot also be an interior node, in either direction.
        let conflict = self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .find(|k| k != key && (in_subtree(key, k) || in_subtree(k, key)));
        if let Some(other) = conflict {
            let reason = if in_subtree(key, &other) {
                format!("{other} is a leaf")
            } else {
                format!("{other} is stored below it")
            };
            return Err(StoreError::Rejected {
                key: key.to_string(),
                reason,
            });
        }
        self.entries.insert(key.to_string(), value.clone());
        self.publish(key.to_string(), Some(value), source);
        Ok(())
    }

    fn remove(&self, key: &str, source: &ChangeSource) -> Result<(), StoreError> {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| in_subtree(k, key))
            .collect();
        for k in doomed {
            if self.entries.remove(&k).is_some() {
                self.publish(k, None, source);
            }
        }
        Ok(())
    }

    fn children(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{key}/");
        let names: BTreeSet<String> = self
            .entries
            .iter()
            .filter_map(|e| {
                e.key()
                    .strip_prefix(&prefix)
                    .and_then(|rest| rest.split('/').next())
                    .map(str::to_string)
            })
            .collect();
        Ok(names.into_iter().collect())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.change_tx.subscribe()
    }
}
