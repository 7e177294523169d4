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

use std::collections::HashMap;
use std::sync::Arc;

/// A pure, stateless server-side stream transform (spec §4.2 "Filters").
/// Returning `None` suppresses the payload entirely (no sequence number is
/// consumed for it).
pub trait StreamFilter: Send + Sync {
    fn apply(&self, payload: &[u8], params: &HashMap<String, String>) -> Option<Vec<u8>>;
}

/// Named filters a server knows how to apply. Looking up an unregistered
/// name is not an error: callers treat a miss as "no filter" (conservative
/// acceptance, spec §4.2).
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn StreamFilter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, filter: Arc<dyn StreamFilter>) {
        self.filters.insert(name.into(), filter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StreamFilter>> {
        self.filters.get(name).cloned()
    }
}
