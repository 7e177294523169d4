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

use dashmap::DashMap;
use meridian_common::ActorId;

/// Human-readable name → `ActorId`, keys unique, no TTL (spec §3
/// "ExposedActorRegistry"). Entries are added via `expose`, removed via
/// `unexpose`, by application code.
#[derive(Default)]
pub struct ExposedActorRegistry {
    inner: DashMap<String, ActorId>,
}

impl ExposedActorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expose(&self, name: impl Into<String>, id: ActorId) {
        self.inner.insert(name.into(), id);
    }

    pub fn unexpose(&self, name: &str) -> Option<ActorId> {
        self.inner.remove(name).map(|(_, id)| id)
    }

    pub fn resolve(&self, name: &str) -> Option<ActorId> {
        self.inner.get(name).map(|entry| entry.clone())
    }
}
