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

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalType {
    User,
    Service,
    System,
}

/// An authenticated identity, produced by an `AuthenticationProvider`
/// and consumed by authorization/rate-limiting middleware (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub kind: PrincipalType,
    pub roles: HashSet<String>,
    pub attributes: HashMap<String, String>,
    pub authenticated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn new(id: impl Into<String>, kind: PrincipalType) -> Self {
        Self {
            id: id.into(),
            kind,
            roles: HashSet::new(),
            attributes: HashMap::new(),
            authenticated_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// `hasAnyRole(S) = principal.roles ∩ S ≠ ∅` (spec §8).
    pub fn has_any_role<'a>(&self, wanted: impl IntoIterator<Item = &'a str>) -> bool {
        wanted.into_iter().any(|r| self.roles.contains(r))
    }

    /// `hasAllRoles(S) = S ⊆ principal.roles` (spec §8).
    pub fn has_all_roles<'a>(&self, wanted: impl IntoIterator<Item = &'a str>) -> bool {
        wanted.into_iter().all(|r| self.roles.contains(r))
    }

    /// `isExpired iff expiresAt ≠ ∅ ∧ expiresAt < now` (spec §8).
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp < Utc::now())
    }
}

/// Per-request correlation context threaded through the middleware chain
/// (spec §3). Middlewares may populate `metadata` for downstream use.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    pub correlation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub principal: Option<Principal>,
    pub metadata: HashMap<String, String>,
}

impl MiddlewareContext {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            principal: None,
            metadata: HashMap::new(),
        }
    }
}

impl Default for MiddlewareContext {
    fn default() -> Self {
        Self::new()
    }
}
