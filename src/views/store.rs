//! In-memory object store backing a resource collection.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::{Map, Value};

pub type Object = Map<String, Value>;

/// Concurrent id → object map with server-assigned integer ids.
#[derive(Debug)]
pub struct ResourceStore {
    next_id: AtomicU64,
    rows: DashMap<u64, Object>,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            rows: DashMap::new(),
        }
    }

    /// Store a new object, overwriting any client-supplied `id`.
    pub fn insert(&self, mut fields: Object) -> Object {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        fields.insert("id".to_string(), Value::from(id));
        self.rows.insert(id, fields.clone());
        fields
    }

    pub fn get(&self, id: u64) -> Option<Object> {
        self.rows.get(&id).map(|row| row.value().clone())
    }

    /// Replace every field of an existing object.
    pub fn replace(&self, id: u64, mut fields: Object) -> Option<Object> {
        let mut row = self.rows.get_mut(&id)?;
        fields.insert("id".to_string(), Value::from(id));
        *row = fields;
        Some(row.value().clone())
    }

    /// Overwrite the given top-level fields of an existing object.
    pub fn merge(&self, id: u64, fields: Object) -> Option<Object> {
        let mut row = self.rows.get_mut(&id)?;
        for (key, value) in fields {
            if key != "id" {
                row.insert(key, value);
            }
        }
        Some(row.value().clone())
    }

    pub fn remove(&self, id: u64) -> bool {
        self.rows.remove(&id).is_some()
    }

    /// All objects ordered by id.
    pub fn list(&self) -> Vec<Object> {
        let mut rows: Vec<(u64, Object)> = self
            .rows
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        rows.sort_unstable_by_key(|(id, _)| *id);
        rows.into_iter().map(|(_, row)| row).collect()
    }

    /// The most recently created object still present.
    pub fn latest(&self) -> Option<Object> {
        self.rows
            .iter()
            .max_by_key(|entry| *entry.key())
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
