// Copyright 2026 Meridian Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `StateStore` (spec §6), consumed by optional stateful actors. The core
//! ships only an in-memory reference implementation; cloud-backed stores
//! are explicitly out of scope (spec §1) and are expected to implement
//! the same trait at their own call site.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use meridian_metrics::{names, tags, Collector, MetricsCollector};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StorageError {
    #[error("state serialization failed: {0}")]
    Serialization(String),
    #[error("state deserialization failed: {0}")]
    Deserialization(String),
    #[error("version conflict: expected {expected}, actual {actual}")]
    VersionConflict { expected: u64, actual: u64 },
    #[error("no state stored for id {0}")]
    NotFound(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Atomic compare-and-set state storage keyed by actor id.
///
/// `save_if_version` MUST be implemented as an atomic compare-and-set on
/// a monotonically increasing sequence number (spec §6).
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load<S>(&self, id: &str) -> StorageResult<Option<S>>
    where
        S: DeserializeOwned + Send;

    async fn save<S>(&self, state: &S, id: &str) -> StorageResult<()>
    where
        S: Serialize + Sync;

    /// Succeeds iff the stored version equals `expected`; on success the
    /// stored version becomes `expected + 1` and that new version is
    /// returned (spec §8 "Optimistic save").
    async fn save_if_version<S>(&self, state: &S, id: &str, expected: u64) -> StorageResult<u64>
    where
        S: Serialize + Sync;

    async fn delete(&self, id: &str) -> StorageResult<()>;

    async fn exists(&self, id: &str) -> StorageResult<bool>;

    async fn update<S, F>(&self, id: &str, transform: F) -> StorageResult<S>
    where
        S: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(Option<S>) -> S + Send;
}

struct Entry_ {
    data: serde_json::Value,
    version: u64,
}

/// In-memory reference `StateStore`, sharded via `dashmap` so concurrent
/// actors touching different ids never contend (the cloud-backed stores
/// this stands in for would use a real CAS-capable backend instead).
pub struct InMemoryStateStore {
    entries: DashMap<String, Entry_>,
    metrics: Arc<dyn Collector>,
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::new_with_metrics(Arc::new(MetricsCollector::default()))
    }

    /// Same as [`Self::new`], but records `state.operations.*` (spec
    /// §4.7) to the given collector instead of a private, unshared
    /// default.
    pub fn new_with_metrics(metrics: Arc<dyn Collector>) -> Self {
        Self {
            entries: DashMap::new(),
            metrics,
        }
    }

    fn record_operation(&self, op: &'static str, started: Instant) {
        let op_tags = tags([("op", op.to_string())]);
        self.metrics.increment_counter(names::STATE_OPERATIONS_COUNT, &op_tags, 1);
        self.metrics.record_histogram(
            names::STATE_OPERATIONS_LATENCY,
            &op_tags,
            started.elapsed().as_secs_f64() * 1000.0,
        );
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn load<S>(&self, id: &str) -> StorageResult<Option<S>>
    where
        S: DeserializeOwned + Send,
    {
        let started = Instant::now();
        let result = match self.entries.get(id) {
            None => Ok(None),
            Some(entry) => serde_json::from_value(entry.data.clone())
                .map(Some)
                .map_err(|e| StorageError::Deserialization(e.to_string())),
        };
        self.record_operation("load", started);
        result
    }

    async fn save<S>(&self, state: &S, id: &str) -> StorageResult<()>
    where
        S: Serialize + Sync,
    {
        let started = Instant::now();
        let data =
            serde_json::to_value(state).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let next_version = self.entries.get(id).map(|e| e.version + 1).unwrap_or(1);
        self.entries.insert(
            id.to_string(),
            Entry_ {
                data,
                version: next_version,
            },
        );
        self.record_operation("save", started);
        Ok(())
    }

    async fn save_if_version<S>(&self, state: &S, id: &str, expected: u64) -> StorageResult<u64>
    where
        S: Serialize + Sync,
    {
        let started = Instant::now();
        let data =
            serde_json::to_value(state).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let result = match self.entries.entry(id.to_string()) {
            Entry::Vacant(slot) => {
                if expected != 0 {
                    Err(StorageError::VersionConflict {
                        expected,
                        actual: 0,
                    })
                } else {
                    slot.insert(Entry_ { data, version: 1 });
                    Ok(1)
                }
            }
            Entry::Occupied(mut slot) => {
                let actual = slot.get().version;
                if actual != expected {
                    Err(StorageError::VersionConflict { expected, actual })
                } else {
                    let new_version = actual + 1;
                    slot.insert(Entry_ {
                        data,
                        version: new_version,
                    });
                    Ok(new_version)
                }
            }
        };
        self.record_operation("save_if_version", started);
        result
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let started = Instant::now();
        self.entries.remove(id);
        self.record_operation("delete", started);
        Ok(())
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.entries.contains_key(id))
    }

    async fn update<S, F>(&self, id: &str, transform: F) -> StorageResult<S>
    where
        S: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce(Option<S>) -> S + Send,
    {
        let current = self.load::<S>(id).await?;
        let next = transform(current);
        self.save(&next, id).await?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
    struct Counter {
        value: i64,
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = InMemoryStateStore::new();
        store.save(&Counter { value: 42 }, "a").await.unwrap();
        let loaded: Option<Counter> = store.load("a").await.unwrap();
        assert_eq!(loaded, Some(Counter { value: 42 }));
    }

    #[tokio::test]
    async fn exists_and_delete() {
        let store = InMemoryStateStore::new();
        assert!(!store.exists("a").await.unwrap());
        store.save(&Counter { value: 1 }, "a").await.unwrap();
        assert!(store.exists("a").await.unwrap());
        store.delete("a").await.unwrap();
        assert!(!store.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn save_if_version_succeeds_on_match_and_bumps_version() {
        let store = InMemoryStateStore::new();
        let v1 = store
            .save_if_version(&Counter { value: 1 }, "a", 0)
            .await
            .unwrap();
        assert_eq!(v1, 1);
        let v2 = store
            .save_if_version(&Counter { value: 2 }, "a", 1)
            .await
            .unwrap();
        assert_eq!(v2, 2);
    }

    #[tokio::test]
    async fn save_if_version_conflicts_on_mismatch() {
        let store = InMemoryStateStore::new();
        store
            .save_if_version(&Counter { value: 1 }, "a", 0)
            .await
            .unwrap();
        let err = store
            .save_if_version(&Counter { value: 2 }, "a", 0)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StorageError::VersionConflict {
                expected: 0,
                actual: 1
            }
        );
    }

    #[tokio::test]
    async fn concurrent_save_if_version_yields_exactly_one_success() {
        let store = Arc::new(InMemoryStateStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.save_if_version(&Counter { value: 1 }, "a", 0).await
            }));
        }
        let mut successes = 0;
        let mut conflicts = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => successes += 1,
                Err(StorageError::VersionConflict { .. }) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e:?}"),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn save_and_load_record_state_operation_metrics() {
        let metrics = Arc::new(MetricsCollector::default());
        let store = InMemoryStateStore::new_with_metrics(metrics.clone());
        store.save(&Counter { value: 1 }, "a").await.unwrap();
        let _: Option<Counter> = store.load("a").await.unwrap();

        let flushed = metrics.flush();
        let save_tags = vec![("op".to_string(), "save".to_string())];
        let load_tags = vec![("op".to_string(), "load".to_string())];
        assert_eq!(flushed.counters[&(names::STATE_OPERATIONS_COUNT.to_string(), save_tags)], 1);
        assert_eq!(flushed.counters[&(names::STATE_OPERATIONS_COUNT.to_string(), load_tags)], 1);
        assert!(flushed.histograms.contains_key(&(
            names::STATE_OPERATIONS_LATENCY.to_string(),
            vec![("op".to_string(), "save".to_string())]
        )));
    }

    #[tokio::test]
    async fn update_applies_transform_over_missing_state() {
        let store = InMemoryStateStore::new();
        let result: Counter = store
            .update("a", |current: Option<Counter>| Counter {
                value: current.map(|c| c.value).unwrap_or(0) + 1,
            })
            .await
            .unwrap();
        assert_eq!(result, Counter { value: 1 });
    }
}
