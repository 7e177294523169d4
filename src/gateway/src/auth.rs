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

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_common::{InvocationEnvelope, MiddlewareContext, Principal};

use crate::error::GatewayError;
use crate::middleware::{Middleware, Next};

/// Extracted from the request before a provider ever sees it (spec
/// §4.6). A principal's concrete identity scheme is a provider concern;
/// the gateway only knows these four shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    ApiKey(String),
    Basic { username: String, password: String },
    Custom(HashMap<String, String>),
}

/// Verifies [`Credentials`] and produces a [`Principal`] (spec §4.6).
/// Implementations own whatever store or upstream call backs them; the
/// gateway only ever sees the outcome.
#[async_trait]
pub trait AuthenticationProvider: Send + Sync {
    async fn authenticate(&self, credentials: Credentials) -> Result<Principal, GatewayError>;
}

/// Parses the `"<scheme>:<value>"` convention this gateway uses for the
/// `credentials` entry in [`MiddlewareContext::metadata`] (SPEC_FULL
/// §B): `bearer:<token>`, `apikey:<key>`, `basic:<user>:<pass>`, or
/// `custom:<k1>=<v1>,<k2>=<v2>,...`.
fn parse_credentials(raw: &str) -> Result<Credentials, GatewayError> {
    let (scheme, rest) = raw
        .split_once(':')
        .ok_or_else(|| GatewayError::MalformedCredentials("missing scheme prefix".into()))?;
    match scheme {
        "bearer" => Ok(Credentials::Bearer(rest.to_string())),
        "apikey" => Ok(Credentials::ApiKey(rest.to_string())),
        "basic" => {
            let (username, password) = rest
                .split_once(':')
                .ok_or_else(|| GatewayError::MalformedCredentials("basic scheme needs user:pass".into()))?;
            Ok(Credentials::Basic {
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        "custom" => {
            let mut fields = HashMap::new();
            for pair in rest.split(',').filter(|p| !p.is_empty()) {
                let (k, v) = pair
                    .split_once('=')
                    .ok_or_else(|| GatewayError::MalformedCredentials(format!("malformed custom field '{pair}'")))?;
                fields.insert(k.to_string(), v.to_string());
            }
            Ok(Credentials::Custom(fields))
        }
        other => Err(GatewayError::MalformedCredentials(format!("unknown scheme '{other}'"))),
    }
}

/// Authenticates every invocation before it reaches authorization (spec
/// §4.6): extracts credentials from `context.metadata[metadata_key]`,
/// delegates to `provider`, and stores the resulting [`Principal`] on
/// `context.principal` for downstream middlewares.
pub struct AuthenticationMiddleware {
    provider: Arc<dyn AuthenticationProvider>,
    metadata_key: String,
}

impl AuthenticationMiddleware {
    pub fn new(provider: Arc<dyn AuthenticationProvider>) -> Self {
        Self { provider, metadata_key: "credentials".to_string() }
    }

    pub fn with_metadata_key(mut self, key: impl Into<String>) -> Self {
        self.metadata_key = key.into();
        self
    }
}

#[async_trait]
impl Middleware for AuthenticationMiddleware {
    async fn process(
        &self,
        envelope: InvocationEnvelope,
        mut context: MiddlewareContext,
        next: Next,
    ) -> Result<Vec<u8>, GatewayError> {
        let raw = context
            .metadata
            .get(&self.metadata_key)
            .cloned()
            .ok_or(GatewayError::MissingCredentials)?;
        let credentials = parse_credentials(&raw)?;
        let principal = self.provider.authenticate(credentials).await?;
        if principal.is_expired() {
            return Err(GatewayError::CredentialsExpired);
        }
        context.principal = Some(principal);
        next.run(envelope, context).await
    }
}

/// A fixed table of known principals keyed by bearer token or API key
/// (SPEC_FULL §B reference implementation). Suitable for tests and
/// small deployments; a production provider would back this with a
/// store and support rotation.
pub struct InMemoryAuthenticationProvider {
    bearer_tokens: DashMap<String, Principal>,
    api_keys: DashMap<String, Principal>,
}

impl InMemoryAuthenticationProvider {
    pub fn new() -> Self {
        Self { bearer_tokens: DashMap::new(), api_keys: DashMap::new() }
    }

    pub fn with_bearer_token(self, token: impl Into<String>, principal: Principal) -> Self {
        self.bearer_tokens.insert(token.into(), principal);
        self
    }

    pub fn with_api_key(self, key: impl Into<String>, principal: Principal) -> Self {
        self.api_keys.insert(key.into(), principal);
        self
    }
}

impl Default for InMemoryAuthenticationProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthenticationProvider for InMemoryAuthenticationProvider {
    async fn authenticate(&self, credentials: Credentials) -> Result<Principal, GatewayError> {
        match credentials {
            Credentials::Bearer(token) => self
                .bearer_tokens
                .get(&token)
                .map(|entry| entry.clone())
                .ok_or(GatewayError::InvalidCredentials),
            Credentials::ApiKey(key) => self
                .api_keys
                .get(&key)
                .map(|entry| entry.clone())
                .ok_or(GatewayError::InvalidCredentials),
            Credentials::Basic { .. } => Err(GatewayError::MalformedCredentials(
                "basic auth is not supported by this provider".into(),
            )),
            Credentials::Custom(_) => Err(GatewayError::MalformedCredentials(
                "custom credentials are not supported by this provider".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::PrincipalType;

    #[test]
    fn parses_every_known_scheme() {
        assert_eq!(parse_credentials("bearer:abc").unwrap(), Credentials::Bearer("abc".into()));
        assert_eq!(parse_credentials("apikey:xyz").unwrap(), Credentials::ApiKey("xyz".into()));
        assert_eq!(
            parse_credentials("basic:alice:secret").unwrap(),
            Credentials::Basic { username: "alice".into(), password: "secret".into() }
        );
        match parse_credentials("custom:a=1,b=2").unwrap() {
            Credentials::Custom(fields) => {
                assert_eq!(fields.get("a"), Some(&"1".to_string()));
                assert_eq!(fields.get("b"), Some(&"2".to_string()));
            }
            _ => panic!("expected custom"),
        }
    }

    #[test]
    fn rejects_unknown_scheme_and_missing_prefix() {
        assert!(parse_credentials("no-colon-here").is_err());
        assert!(parse_credentials("carrier-pigeon:abc").is_err());
    }

    #[tokio::test]
    async fn in_memory_provider_authenticates_known_bearer_token() {
        let principal = Principal::new("user-1", PrincipalType::User);
        let provider = InMemoryAuthenticationProvider::new().with_bearer_token("tok-1", principal.clone());
        let resolved = provider.authenticate(Credentials::Bearer("tok-1".into())).await.unwrap();
        assert_eq!(resolved.id, "user-1");
    }

    #[tokio::test]
    async fn in_memory_provider_rejects_unknown_token() {
        let provider = InMemoryAuthenticationProvider::new();
        let result = provider.authenticate(Credentials::Bearer("ghost".into())).await;
        assert!(matches!(result, Err(GatewayError::InvalidCredentials)));
    }
}
