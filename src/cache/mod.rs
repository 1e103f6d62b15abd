//! Dedup caches shared by the mining pipelines
//!
//! A [`DedupCache`] maps a natural key (author email, file path) to a
//! store-assigned identifier. Creation goes through DashMap's entry API, so
//! the creating closure runs at most once per key even when many workers
//! ask for the same missing key at the same time.
//!
//! Caches are plain values owned by the caller and passed into the
//! pipelines; nothing here is process-global.

pub mod paths;

pub use paths::{ensure_parent_dir, get_cache_dir, get_mining_db_path};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::hash::Hash;

/// Thread-safe get-or-create map.
pub struct DedupCache<K, V> {
    entries: DashMap<K, V>,
}

impl<K, V> Default for DedupCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K, V> DedupCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Return the cached value or run `create` under the key's shard lock.
    ///
    /// A failing `create` leaves the key absent, so a later call retries.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        create: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(v) = self.entries.get(&key) {
            return Ok(v.value().clone());
        }
        match self.entries.entry(key) {
            Entry::Occupied(e) => Ok(e.get().clone()),
            Entry::Vacant(e) => {
                let value = create()?;
                e.insert(value.clone());
                Ok(value)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

/// Identifier caches for one mining session.
#[derive(Default)]
pub struct MiningCaches {
    /// author email -> author id
    pub authors: DedupCache<String, u64>,
    /// file path -> path id
    pub file_paths: DedupCache<String, u64>,
}

impl MiningCaches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, e.g. when switching projects.
    pub fn reset(&self) {
        self.authors.clear();
        self.file_paths.clear();
    }
}
