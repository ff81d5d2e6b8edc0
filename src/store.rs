//! The in-memory multi-index.
//!
//! A [`Store`] maps index names to key/value tables where each key holds an
//! append-only list of values. Writes are cheap appends safe to issue from
//! many scan threads at once; reads deduplicate on the way out, preserving
//! first-insertion order, so every query observes set semantics.
//!
//! Two closure queries operate over an index interpreted as an edge
//! relation: [`Store::get_all_including`] walks the transitive closure of a
//! seed set (seeds included), and [`Store::get_all`] walks the closure of
//! the seeds' direct values. Both terminate on cyclic data.

use std::collections::{BTreeMap, HashSet};

use dashmap::DashMap;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{ClassmapError, Result};

/// A plain, ordered snapshot of a store: index -> key -> deduplicated values.
pub type Snapshot = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// The multi-index backing every scan result and query.
#[derive(Debug, Default)]
pub struct Store {
    indexes: DashMap<String, DashMap<String, Vec<String>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure an index exists, even if no value is ever written to it.
    /// Scanners are registered this way so that querying a configured but
    /// empty index returns an empty set instead of a configuration error.
    pub fn register_index(&self, index: &str) {
        self.indexes.entry(index.to_string()).or_default();
    }

    /// Append `value` under `key` in `index`, creating both as needed.
    /// Returns `true` when the value was not already present for that key,
    /// which lets callers short-circuit work that only needs to run once
    /// per distinct pair.
    pub fn put(&self, index: &str, key: &str, value: &str) -> bool {
        let inner = self.indexes.entry(index.to_string()).or_default();
        let mut values = inner.entry(key.to_string()).or_default();
        let fresh = !values.iter().any(|v| v == value);
        values.push(value.to_string());
        fresh
    }

    /// Whether the index exists at all (registered or written to).
    pub fn has_index(&self, index: &str) -> bool {
        self.indexes.contains_key(index)
    }

    /// Names of all indexes, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// The deduplicated union of values stored under the given keys.
    pub fn get<I, S>(&self, index: &str, keys: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inner = self.index(index)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for key in keys {
            if let Some(values) = inner.get(key.as_ref()) {
                for value in values.iter() {
                    if seen.insert(value.clone()) {
                        out.push(value.clone());
                    }
                }
            }
        }
        Ok(out)
    }

    /// The transitive closure of the seed keys over `index`, seeds included.
    /// Each element is expanded at most once, so cyclic edges terminate.
    pub fn get_all_including<I, S>(&self, index: &str, seeds: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inner = self.index(index)?;
        let mut work: Vec<String> = seeds.into_iter().map(|s| s.as_ref().to_string()).collect();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut next = 0;
        while next < work.len() {
            let current = work[next].clone();
            next += 1;
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(values) = inner.get(&current) {
                work.extend(values.iter().cloned());
            }
            out.push(current);
        }
        Ok(out)
    }

    /// The transitive closure of the seeds' direct values, seeds excluded
    /// unless reachable as values themselves.
    pub fn get_all<I, S>(&self, index: &str, seeds: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let direct = self.get(index, seeds)?;
        self.get_all_including(index, direct)
    }

    /// All keys of an index, deduplicated in insertion order.
    pub fn keys(&self, index: &str) -> Result<Vec<String>> {
        let inner = self.index(index)?;
        Ok(inner.iter().map(|e| e.key().clone()).collect())
    }

    /// All values of an index, deduplicated.
    pub fn values(&self, index: &str) -> Result<Vec<String>> {
        let inner = self.index(index)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for entry in inner.iter() {
            for value in entry.value() {
                if seen.insert(value.clone()) {
                    out.push(value.clone());
                }
            }
        }
        Ok(out)
    }

    /// Total distinct keys and total stored values across all indexes.
    pub fn counts(&self) -> (usize, usize) {
        let mut keys = 0;
        let mut values = 0;
        for index in self.indexes.iter() {
            keys += index.value().len();
            values += index.value().iter().map(|e| e.value().len()).sum::<usize>();
        }
        (keys, values)
    }

    /// Replay every entry of `other` into this store. Re-merging the same
    /// store is idempotent under read semantics since duplicates collapse
    /// on read.
    ///
    /// Replays from a materialized snapshot so no shard guard on `other` is
    /// held across writes; this keeps `store.merge(&store)` from deadlocking
    /// when both sides land on the same shard.
    pub fn merge(&self, other: &Store) {
        for (index, table) in other.snapshot() {
            self.register_index(&index);
            for (key, values) in table {
                for value in values {
                    self.put(&index, &key, &value);
                }
            }
        }
    }

    /// An ordered, deduplicated copy of the whole store.
    pub fn snapshot(&self) -> Snapshot {
        let mut out = Snapshot::new();
        for index in self.indexes.iter() {
            let table = out.entry(index.key().clone()).or_default();
            for entry in index.value().iter() {
                let mut seen = HashSet::new();
                let values = entry
                    .value()
                    .iter()
                    .filter(|v| seen.insert((*v).clone()))
                    .cloned()
                    .collect();
                table.insert(entry.key().clone(), values);
            }
        }
        out
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Store::new();
        for (index, table) in snapshot {
            store.register_index(&index);
            for (key, values) in table {
                for value in values {
                    store.put(&index, &key, &value);
                }
            }
        }
        store
    }

    fn index(&self, index: &str) -> Result<dashmap::mapref::one::Ref<'_, String, DashMap<String, Vec<String>>>> {
        self.indexes
            .get(index)
            .ok_or_else(|| ClassmapError::Configuration {
                index: index.to_string(),
            })
    }
}

impl Serialize for Store {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.snapshot().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Store {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Store::from_snapshot(Snapshot::deserialize(deserializer)?))
    }
}
