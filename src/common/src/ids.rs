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

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A transport peer, `{host, port}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A logical actor identifier.
///
/// Equality is structural: two `ActorId`s are equal iff their `id` and
/// `endpoint` match exactly. The `endpoint` is absent for local-origin
/// actors and mandatory to dispatch a call remotely (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId {
    pub id: String,
    pub endpoint: Option<Endpoint>,
}

impl ActorId {
    pub fn local(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: None,
        }
    }

    pub fn remote(id: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            id: id.into(),
            endpoint: Some(endpoint),
        }
    }

    pub fn is_local(&self) -> bool {
        self.endpoint.is_none()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            Some(ep) => write!(f, "{}@{}", self.id, ep),
            None => write!(f, "{}", self.id),
        }
    }
}

impl FromStr for ActorId {
    type Err = CoreError;

    /// Parses `<id>@<host>:<port>` or bare `<id>`. Tolerates a missing
    /// `@host:port` suffix; rejects a malformed port.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            None => Ok(ActorId::local(s)),
            Some((id, hostport)) => {
                let (host, port) = hostport.rsplit_once(':').ok_or_else(|| {
                    CoreError::InvalidConfiguration(format!(
                        "actor id '{s}' has an '@' but no ':<port>'"
                    ))
                })?;
                let port: u16 = port.parse().map_err(|_| {
                    CoreError::InvalidConfiguration(format!(
                        "actor id '{s}' has a malformed port '{port}'"
                    ))
                })?;
                Ok(ActorId::remote(id, Endpoint::new(host, port)))
            }
        }
    }
}
