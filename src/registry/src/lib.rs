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

//! `ServiceRegistry` (spec §6): resolves actor ids to endpoints. The core
//! ships only a single-process, in-memory reference implementation;
//! federated discovery and cloud-specific registries (CloudMap and
//! similar) are explicitly out of scope (spec §1).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use meridian_common::Endpoint;
use moka::future::Cache;
use moka::Expiry;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("id {0} is not registered")]
    NotFound(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Clone)]
pub struct Registration {
    pub endpoint: Endpoint,
    pub metadata: HashMap<String, String>,
    pub ttl: Option<Duration>,
}

#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn register(
        &self,
        id: &str,
        endpoint: Endpoint,
        metadata: HashMap<String, String>,
        ttl: Option<Duration>,
    );
    async fn deregister(&self, id: &str);
    async fn resolve(&self, id: &str) -> Option<Endpoint>;
    async fn resolve_all(&self, id: &str) -> Vec<Endpoint>;
    async fn list(&self, prefix: Option<&str>) -> Vec<(String, Endpoint)>;
    /// Refreshes a registration's TTL clock. A no-op if `id` is unknown.
    async fn heartbeat(&self, id: &str);
}

/// Per-entry expiry driven by the TTL supplied at `register` time. Entries
/// registered with `ttl = None` never expire on their own.
struct TtlExpiry;

impl Expiry<(String, Endpoint), Registration> for TtlExpiry {
    fn expire_after_create(
        &self,
        _key: &(String, Endpoint),
        value: &Registration,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &(String, Endpoint),
        value: &Registration,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-memory `ServiceRegistry` keyed by `(id, endpoint)` so the same id
/// can be registered from several endpoints; `moka`'s per-entry expiry
/// evicts stale registrations without a dedicated sweep task.
pub struct InMemoryServiceRegistry {
    entries: Cache<(String, Endpoint), Registration>,
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(TtlExpiry).build(),
        }
    }
}

impl Default for InMemoryServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryServiceRegistry {
    async fn register(
        &self,
        id: &str,
        endpoint: Endpoint,
        metadata: HashMap<String, String>,
        ttl: Option<Duration>,
    ) {
        self.entries
            .insert(
                (id.to_string(), endpoint.clone()),
                Registration {
                    endpoint,
                    metadata,
                    ttl,
                },
            )
            .await;
    }

    async fn deregister(&self, id: &str) {
        let keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(k, _)| k.0 == id)
            .map(|(k, _)| (*k).clone())
            .collect();
        for key in keys {
            self.entries.invalidate(&key).await;
        }
    }

    async fn resolve(&self, id: &str) -> Option<Endpoint> {
        self.entries
            .iter()
            .find(|(k, _)| k.0 == id)
            .map(|(_, v)| v.endpoint.clone())
    }

    async fn resolve_all(&self, id: &str) -> Vec<Endpoint> {
        self.entries
            .iter()
            .filter(|(k, _)| k.0 == id)
            .map(|(_, v)| v.endpoint.clone())
            .collect()
    }

    async fn list(&self, prefix: Option<&str>) -> Vec<(String, Endpoint)> {
        self.entries
            .iter()
            .filter(|(k, _)| match prefix {
                Some(p) => k.0.starts_with(p),
                None => true,
            })
            .map(|(k, v)| (k.0.clone(), v.endpoint.clone()))
            .collect()
    }

    async fn heartbeat(&self, id: &str) {
        let matches: Vec<_> = self
            .entries
            .iter()
            .filter(|(k, _)| k.0 == id)
            .map(|(k, v)| ((*k).clone(), v))
            .collect();
        for (key, registration) in matches {
            // Re-insert to reset the per-entry expiry clock.
            self.entries.insert(key, (*registration).clone()).await;
        }
    }
}

// Kept for call sites that want a type alias without naming the `Arc`.
pub type SharedServiceRegistry = Arc<dyn ServiceRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(port: u16) -> Endpoint {
        Endpoint::new("127.0.0.1", port)
    }

    #[tokio::test]
    async fn register_resolve_deregister() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register("room", ep(9000), HashMap::new(), None)
            .await;
        assert_eq!(registry.resolve("room").await, Some(ep(9000)));
        registry.deregister("room").await;
        assert_eq!(registry.resolve("room").await, None);
    }

    #[tokio::test]
    async fn resolve_all_returns_every_endpoint_for_an_id() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register("room", ep(9000), HashMap::new(), None)
            .await;
        registry
            .register("room", ep(9001), HashMap::new(), None)
            .await;
        let mut all = registry.resolve_all("room").await;
        all.sort_by_key(|e| e.port);
        assert_eq!(all, vec![ep(9000), ep(9001)]);
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register("room-1", ep(9000), HashMap::new(), None)
            .await;
        registry
            .register("lobby", ep(9001), HashMap::new(), None)
            .await;
        let filtered = registry.list(Some("room-")).await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].0, "room-1");
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let registry = InMemoryServiceRegistry::new();
        registry
            .register("room", ep(9000), HashMap::new(), Some(Duration::from_millis(20)))
            .await;
        assert_eq!(registry.resolve("room").await, Some(ep(9000)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        registry.entries.run_pending_tasks().await;
        assert_eq!(registry.resolve("room").await, None);
    }
}
