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

use std::time::Duration;

use thiserror::Error;

/// The closed set of ways a middleware chain rejects or fails an
/// invocation (spec §4.6, §7). Never surfaced to callers directly: the
/// gateway shapes every variant into a `response.failure` string and a
/// `reason` tag on `invocations.errors`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("no credentials presented")]
    MissingCredentials,

    #[error("malformed credentials: {0}")]
    MalformedCredentials(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("credentials expired")]
    CredentialsExpired,

    #[error("authentication provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("principal lacks permission for {action} on {resource}")]
    AccessDenied { action: String, resource: String },

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimitExceeded { retry_after: Option<Duration> },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("actor not found: {0}")]
    ActorNotFound(String),

    #[error("handler error: {0}")]
    Handler(String),
}

impl GatewayError {
    /// The closed reason-tag set attached to `invocations.errors` (spec
    /// §4.7, §7): `{authentication_error, authorization_error,
    /// rate_limit_exceeded, validation_error, handler_error,
    /// actor_not_found}`.
    pub fn reason_tag(&self) -> &'static str {
        match self {
            GatewayError::MissingCredentials
            | GatewayError::MalformedCredentials(_)
            | GatewayError::InvalidCredentials
            | GatewayError::CredentialsExpired
            | GatewayError::ProviderUnavailable(_) => "authentication_error",
            GatewayError::AccessDenied { .. } => "authorization_error",
            GatewayError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            GatewayError::Validation(_) => "validation_error",
            GatewayError::ActorNotFound(_) => "actor_not_found",
            GatewayError::Handler(_) => "handler_error",
        }
    }

    /// The category-prefixed string carried on `response.failure` (spec
    /// §7), e.g. `"Authentication failed: invalid credentials"`.
    pub fn response_message(&self) -> String {
        let prefix = match self {
            GatewayError::MissingCredentials
            | GatewayError::MalformedCredentials(_)
            | GatewayError::InvalidCredentials
            | GatewayError::CredentialsExpired
            | GatewayError::ProviderUnavailable(_) => "Authentication failed",
            GatewayError::AccessDenied { .. } => "Authorization failed",
            GatewayError::RateLimitExceeded { .. } => "Rate limit exceeded",
            GatewayError::Validation(_) => "Validation failed",
            GatewayError::ActorNotFound(_) => "Actor not found",
            GatewayError::Handler(_) => "Handler error",
        };
        format!("{prefix}: {self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_tags_match_the_closed_set() {
        assert_eq!(GatewayError::InvalidCredentials.reason_tag(), "authentication_error");
        assert_eq!(
            GatewayError::AccessDenied { action: "a".into(), resource: "r".into() }.reason_tag(),
            "authorization_error"
        );
        assert_eq!(
            GatewayError::RateLimitExceeded { retry_after: None }.reason_tag(),
            "rate_limit_exceeded"
        );
        assert_eq!(GatewayError::Validation("x".into()).reason_tag(), "validation_error");
        assert_eq!(GatewayError::ActorNotFound("x".into()).reason_tag(), "actor_not_found");
        assert_eq!(GatewayError::Handler("x".into()).reason_tag(), "handler_error");
    }

    #[test]
    fn response_message_carries_category_prefix() {
        let msg = GatewayError::InvalidCredentials.response_message();
        assert!(msg.starts_with("Authentication failed: "));
    }
}
