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

use async_trait::async_trait;
use meridian_common::Endpoint;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::TransportResult;

/// A lazy sequence of inbound messages. Single-consumer: the server or
/// client dispatch loop takes it exactly once via [`Transport::incoming`]
/// (spec §4.3, §5).
pub type IncomingMessages = ReceiverStream<crate::message::TransportMessage>;

/// The transport abstraction (spec §4.3): send, listen, shutdown, and a
/// single inbound message stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers one framed message, establishing a session for
    /// `endpoint` if the pool has none yet.
    async fn send(&self, data: Vec<u8>, endpoint: Endpoint) -> TransportResult<()>;

    /// Proactively establishes the outbound session for `endpoint`,
    /// without sending any application data. Client dispatch (spec §4.5)
    /// uses this to drive its `connecting` → `connected` transition
    /// explicitly rather than piggybacking on the first real call.
    async fn connect(&self, endpoint: Endpoint) -> TransportResult<()>;

    /// Tears down any outbound session held for `endpoint`, so the next
    /// `connect`/`send` dials fresh. Used by client dispatch before a
    /// reconnection attempt.
    fn disconnect(&self, endpoint: &Endpoint);

    /// Sends a protocol-level keepalive ping on the session held for
    /// `endpoint`, if any. A no-op when no session is open — client
    /// dispatch (spec §4.5) calls this on a timer so an idle connection
    /// is detected before the next real write fails.
    async fn ping(&self, endpoint: &Endpoint) -> TransportResult<()>;

    /// Binds a server socket; after this returns, `incoming` yields
    /// messages accepted on it.
    async fn listen(&self, endpoint: Endpoint) -> TransportResult<()>;

    /// Closes every session and the listening socket, ending `incoming`.
    async fn shutdown(&self) -> TransportResult<()>;

    /// Takes ownership of the inbound stream. Panics if called more than
    /// once: the inbound sequence has exactly one consumer.
    fn incoming(&self) -> IncomingMessages;
}
