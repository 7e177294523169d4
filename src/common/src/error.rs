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

/// The closed error set surfaced by the core (spec §4.8).
///
/// Middleware-specific categories (authentication, authorization,
/// rate-limiting, validation) live in `meridian_gateway` and are mapped
/// into a `response.failure` string by the gateway, never into this enum.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("connection to {host}:{port} failed: {underlying}")]
    ConnectionFailed {
        host: String,
        port: u16,
        underlying: String,
    },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("actor not found: {0}")]
    ActorNotFound(String),

    #[error("remote invocation failed: {0}")]
    RemoteInvocationFailed(String),

    #[error("actor system is not running")]
    SystemNotRunning,

    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl CoreError {
    pub fn serialization(err: impl std::fmt::Display) -> Self {
        CoreError::SerializationFailed(err.to_string())
    }

    pub fn deserialization(err: impl std::fmt::Display) -> Self {
        CoreError::DeserializationFailed(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
