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
use std::sync::Arc;

use async_trait::async_trait;
use meridian_common::{InvocationEnvelope, MiddlewareContext, Principal};

use crate::error::GatewayError;
use crate::middleware::{Middleware, Next};

/// An action a principal attempts, derived from the envelope's target
/// (spec §4.6): `{actor_type}.{method}`, e.g. `room.kick`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Action(pub String);

/// The concrete thing an action is performed against: the actor's type
/// (the prefix of its id up to the first `-`, per `assign_id`'s naming
/// convention) and its instance id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    pub actor_type: String,
    pub actor_id: String,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.actor_type, self.actor_id)
    }
}

fn actor_type_of(actor_id: &str) -> &str {
    actor_id.split_once('-').map(|(prefix, _)| prefix).unwrap_or(actor_id)
}

/// Decides whether `principal` may perform `action` on `resource` (spec
/// §4.6). Implementations may consult roles, attributes, or an external
/// policy store.
#[async_trait]
pub trait AuthorizationPolicy: Send + Sync {
    async fn authorize(&self, principal: &Principal, action: &Action, resource: &Resource) -> bool;
}

/// Rejects every invocation from an unauthenticated principal, then
/// delegates the allow/deny decision to an [`AuthorizationPolicy`]
/// (spec §4.6). Must run after [`crate::auth::AuthenticationMiddleware`]
/// in the chain.
pub struct AuthorizationMiddleware {
    policy: Arc<dyn AuthorizationPolicy>,
}

impl AuthorizationMiddleware {
    pub fn new(policy: Arc<dyn AuthorizationPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Middleware for AuthorizationMiddleware {
    async fn process(
        &self,
        envelope: InvocationEnvelope,
        context: MiddlewareContext,
        next: Next,
    ) -> Result<Vec<u8>, GatewayError> {
        let principal = context
            .principal
            .as_ref()
            .ok_or(GatewayError::MissingCredentials)?;
        let action = Action(format!("{}.{}", actor_type_of(&envelope.actor.id), envelope.target));
        let resource = Resource {
            actor_type: actor_type_of(&envelope.actor.id).to_string(),
            actor_id: envelope.actor.id.clone(),
        };
        if !self.policy.authorize(principal, &action, &resource).await {
            return Err(GatewayError::AccessDenied {
                action: action.0,
                resource: resource.to_string(),
            });
        }
        next.run(envelope, context).await
    }
}

/// Role-based policy: an action is permitted if the principal holds any
/// role mapped to it, or any role mapped to the wildcard action `"*"`
/// (SPEC_FULL §B reference implementation).
pub struct RoleBasedAuthorizationPolicy {
    required_roles: HashMap<String, HashSet<String>>,
}

impl RoleBasedAuthorizationPolicy {
    pub fn new() -> Self {
        Self { required_roles: HashMap::new() }
    }

    /// Any of `roles` grants `action` (`"*"` matches every action).
    pub fn allow(mut self, action: impl Into<String>, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.required_roles
            .entry(action.into())
            .or_default()
            .extend(roles.into_iter().map(Into::into));
        self
    }
}

impl Default for RoleBasedAuthorizationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthorizationPolicy for RoleBasedAuthorizationPolicy {
    async fn authorize(&self, principal: &Principal, action: &Action, _resource: &Resource) -> bool {
        let wildcard = self.required_roles.get("*");
        let specific = self.required_roles.get(&action.0);
        let allowed_roles = specific.into_iter().chain(wildcard).flatten();
        principal.has_any_role(allowed_roles.map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::PrincipalType;

    fn principal(roles: &[&str]) -> Principal {
        Principal::new("u1", PrincipalType::User).with_roles(roles.iter().copied())
    }

    #[tokio::test]
    async fn allows_when_principal_holds_a_mapped_role() {
        let policy = RoleBasedAuthorizationPolicy::new().allow("room.kick", ["moderator"]);
        let action = Action("room.kick".into());
        let resource = Resource { actor_type: "room".into(), actor_id: "room-1".into() };
        assert!(policy.authorize(&principal(&["moderator"]), &action, &resource).await);
        assert!(!policy.authorize(&principal(&["guest"]), &action, &resource).await);
    }

    #[tokio::test]
    async fn wildcard_role_grants_every_action() {
        let policy = RoleBasedAuthorizationPolicy::new().allow("*", ["admin"]);
        let action = Action("room.kick".into());
        let resource = Resource { actor_type: "room".into(), actor_id: "room-1".into() };
        assert!(policy.authorize(&principal(&["admin"]), &action, &resource).await);
    }

    #[test]
    fn actor_type_is_the_prefix_before_the_first_dash() {
        assert_eq!(actor_type_of("room-42"), "room");
        assert_eq!(actor_type_of("singleton"), "singleton");
    }
}
