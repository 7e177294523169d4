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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::ActorId;

/// Trace propagation carried by an invocation, generated by the tracing
/// middleware when absent (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
}

/// A named, parameterized stream transform applied server-side before
/// payloads are enqueued (spec §4.2 "Filters").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFilterDescriptor {
    pub name: String,
    pub params: HashMap<String, String>,
}

/// A self-describing remote-call request.
///
/// Arguments are kept as a per-argument list of opaque, independently
/// encoded byte blobs rather than joined into one payload: the source
/// wire format encodes each argument separately and preserving that
/// boundary keeps this implementation wire-compatible (spec §9 open
/// question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationEnvelope {
    pub call_id: Uuid,
    pub actor: ActorId,
    pub target: String,
    #[serde(with = "base64_vec_vec")]
    pub args: Vec<Vec<u8>>,
    pub generics: Vec<String>,
    pub trace_context: Option<TraceContext>,
    pub stream_filter: Option<StreamFilterDescriptor>,
}

/// Tagged success/failure response to an `InvocationEnvelope`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResponseEnvelope {
    Success {
        call_id: Uuid,
        #[serde(with = "base64_bytes")]
        result: Vec<u8>,
    },
    Failure {
        call_id: Uuid,
        error: String,
    },
}

impl ResponseEnvelope {
    pub fn call_id(&self) -> Uuid {
        match self {
            ResponseEnvelope::Success { call_id, .. } => *call_id,
            ResponseEnvelope::Failure { call_id, .. } => *call_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamStartEnvelope {
    pub stream_id: Uuid,
    pub call_id: Uuid,
    pub actor: ActorId,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDataEnvelope {
    pub stream_id: Uuid,
    pub sequence_number: u64,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

/// Closed set of reasons a stream may end (spec §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminationReason {
    Completed,
    ActorTerminated,
    ClientUnsubscribed,
    ConnectionClosed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEndEnvelope {
    pub stream_id: Uuid,
    pub reason: TerminationReason,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamErrorEnvelope {
    pub stream_id: Uuid,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamResumeEnvelope {
    pub stream_id: Uuid,
    pub last_sequence: u64,
}

/// The single on-wire tagged union (spec §3, §6). One JSON object per
/// message, carried as a single binary WebSocket frame; the `kind`
/// discriminator selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransportEnvelope {
    Invocation(InvocationEnvelope),
    Response(ResponseEnvelope),
    StreamStart(StreamStartEnvelope),
    StreamData(StreamDataEnvelope),
    StreamEnd(StreamEndEnvelope),
    StreamError(StreamErrorEnvelope),
    StreamResume(StreamResumeEnvelope),
}

impl TransportEnvelope {
    /// Best-effort extraction of a call id, used to shape an error
    /// response when decoding otherwise fails (spec §4.4).
    pub fn call_id(&self) -> Option<Uuid> {
        match self {
            TransportEnvelope::Invocation(env) => Some(env.call_id),
            TransportEnvelope::Response(env) => Some(env.call_id()),
            _ => None,
        }
    }
}

/// Binary payloads are base64-encoded when embedded in JSON (spec §6).
mod base64_bytes {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

mod base64_vec_vec {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde::ser::SerializeSeq;

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(items.len()))?;
        for item in items {
            seq.serialize_element(&base64::engine::general_purpose::STANDARD.encode(item))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        let encoded = Vec::<String>::deserialize(d)?;
        encoded
            .into_iter()
            .map(|s| {
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_envelope_round_trips_through_json() {
        let env = TransportEnvelope::Invocation(InvocationEnvelope {
            call_id: Uuid::new_v4(),
            actor: ActorId::local("room"),
            target: "greet".into(),
            args: vec![b"\"alice\"".to_vec()],
            generics: vec![],
            trace_context: None,
            stream_filter: None,
        });
        let json = serde_json::to_string(&env).unwrap();
        assert!(json.contains("\"kind\":\"invocation\""));
        let back: TransportEnvelope = serde_json::from_str(&json).unwrap();
        match back {
            TransportEnvelope::Invocation(inv) => assert_eq!(inv.target, "greet"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn call_id_extraction_for_invocation_and_response() {
        let call_id = Uuid::new_v4();
        let inv = TransportEnvelope::Invocation(InvocationEnvelope {
            call_id,
            actor: ActorId::local("x"),
            target: "m".into(),
            args: vec![],
            generics: vec![],
            trace_context: None,
            stream_filter: None,
        });
        assert_eq!(inv.call_id(), Some(call_id));

        let resp = TransportEnvelope::Response(ResponseEnvelope::Failure {
            call_id,
            error: "boom".into(),
        });
        assert_eq!(resp.call_id(), Some(call_id));
    }
}
