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

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use meridian_actor::ActorSystem;
use meridian_common::{ActorId, CoreError, Endpoint, ReconnectionPolicy, TransportEnvelope};
use meridian_stream::StreamConsumer;
use meridian_transport::Transport;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::state::ConnectionState;

/// How often the gap-watcher checks for streams with an unfilled gap
/// older than `gap_fill_timeout` (spec §4.2 "Gap handling", §4.5).
const GAP_WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// How often the client sends a keepalive ping on an otherwise-idle
/// connection, so a dead peer is detected before the next real write
/// fails (spec §4.5 "Connection health").
const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Client dispatch (spec §4.5): a single outbound session to `endpoint`,
/// a background consumer of the inbound sequence, and the reconnection
/// state machine. Wraps an [`ActorSystem`] rather than replacing it —
/// `remote_call`/`remote_call_stream` still go through the actor system;
/// this owns what the actor system does not: connection lifecycle.
pub struct Client {
    actor_system: Arc<ActorSystem>,
    transport: Arc<dyn Transport>,
    endpoint: Endpoint,
    reconnection: ReconnectionPolicy,
    state: Mutex<ConnectionState>,
}

impl Client {
    pub fn new(actor_system: Arc<ActorSystem>, transport: Arc<dyn Transport>, endpoint: Endpoint) -> Arc<Self> {
        let reconnection = actor_system.config().reconnection;
        Arc::new(Self {
            actor_system,
            transport,
            endpoint,
            reconnection,
            state: Mutex::new(ConnectionState::Disconnected),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state.lock().clone()
    }

    pub fn actor_system(&self) -> &Arc<ActorSystem> {
        &self.actor_system
    }

    /// Establishes the outbound session and starts the background inbound
    /// dispatch, gap-watcher and ping-watcher loops. Only valid from
    /// `disconnected` or `failed` (spec §4.5).
    pub async fn connect(self: &Arc<Self>) -> Result<(), CoreError> {
        {
            let mut state = self.state.lock();
            if !state.can_connect() {
                return Err(CoreError::InvalidConfiguration(format!(
                    "cannot connect from state {:?}",
                    *state
                )));
            }
            *state = ConnectionState::Connecting;
        }

        match self.transport.connect(self.endpoint.clone()).await {
            Ok(()) => {
                *self.state.lock() = ConnectionState::Connected;
                self.clone().spawn_inbound_loop();
                self.clone().spawn_gap_watcher();
                self.clone().spawn_ping_watcher();
                Ok(())
            }
            Err(err) => {
                let err = CoreError::from(err);
                *self.state.lock() = ConnectionState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Invoked by call sites that observe `connectionClosed` while using
    /// this client's session. Idempotent: a disconnection already being
    /// handled is a no-op.
    pub fn notify_disconnected(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.is_transitioning() {
                return;
            }
            *state = if self.reconnection.max_attempts == 0 {
                ConnectionState::Failed("reconnection disabled".into())
            } else {
                ConnectionState::Reconnecting(1)
            };
        }
        if self.reconnection.max_attempts > 0 {
            tokio::spawn(self.clone().reconnect_loop());
        } else {
            let system = self.actor_system.clone();
            tokio::spawn(async move { system.on_connection_closed().await });
        }
    }

    async fn reconnect_loop(self: Arc<Self>) {
        self.actor_system.on_connection_closed().await;
        self.transport.disconnect(&self.endpoint);

        let mut attempt = 1u32;
        loop {
            *self.state.lock() = ConnectionState::Reconnecting(attempt);
            tokio::time::sleep(self.reconnection.delay_for_attempt(attempt)).await;

            match self.transport.connect(self.endpoint.clone()).await {
                Ok(()) => {
                    *self.state.lock() = ConnectionState::Connected;
                    self.resume_streams().await;
                    return;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "reconnection attempt failed");
                    if attempt >= self.reconnection.max_attempts {
                        *self.state.lock() = ConnectionState::Failed(err.to_string());
                        return;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Emits a `streamResume` per checkpoint recorded before the
    /// disconnect, so active stream consumers pick up where they left
    /// off (spec §4.5 "Stream resumption on reconnect").
    async fn resume_streams(&self) {
        for checkpoint in self.actor_system.client_streams().checkpoints().await {
            let envelope = TransportEnvelope::StreamResume(checkpoint.to_resume_envelope());
            if let Err(err) = self.send_envelope(&envelope).await {
                warn!(stream_id = %checkpoint.stream_id, %err, "failed to emit streamResume after reconnect");
            }
        }
    }

    async fn send_envelope(&self, envelope: &TransportEnvelope) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(envelope).map_err(CoreError::serialization)?;
        self.transport
            .send(bytes, self.endpoint.clone())
            .await
            .map_err(CoreError::from)
    }

    /// Consumes the transport's single inbound sequence for the lifetime
    /// of the client, routing each envelope to the actor system. Spawned
    /// exactly once, at the first successful `connect`, since reconnects
    /// reuse the same shared inbound channel under a fresh session.
    fn spawn_inbound_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut incoming = self.transport.incoming();
            while let Some(message) = incoming.next().await {
                let envelope: TransportEnvelope = match serde_json::from_slice(&message.bytes) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(%err, "client dispatch failed to decode inbound envelope");
                        continue;
                    }
                };
                match envelope {
                    TransportEnvelope::Response(response) => {
                        self.actor_system.complete_pending_call(response);
                    }
                    TransportEnvelope::StreamStart(start) => self.actor_system.on_stream_start(start),
                    TransportEnvelope::StreamData(data) => self.actor_system.on_stream_data(data).await,
                    TransportEnvelope::StreamEnd(end) => self.actor_system.on_stream_end(end).await,
                    TransportEnvelope::StreamError(err) => self.actor_system.on_stream_error(err).await,
                    other => {
                        debug!(kind = ?other, "envelope kind invalid on client side, dropping");
                    }
                }
            }
        });
    }

    /// Periodically emits a `streamResume` for any stream whose gap has
    /// sat unfilled past the configured timeout, without waiting for a
    /// full reconnect (spec §4.2 "Gap handling").
    fn spawn_gap_watcher(self: Arc<Self>) {
        let timeout = self.actor_system.config().gap_fill_timeout;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(GAP_WATCH_INTERVAL).await;
                if self.state() != ConnectionState::Connected {
                    continue;
                }
                for resume in self.actor_system.client_streams().stale_gaps(timeout) {
                    let envelope = TransportEnvelope::StreamResume(resume.clone());
                    if let Err(err) = self.send_envelope(&envelope).await {
                        warn!(stream_id = %resume.stream_id, %err, "failed to emit gap-fill streamResume");
                    }
                }
            }
        });
    }

    /// Tears down, in order, the child components this client owns: the
    /// client-side stream table and pending-call table (via
    /// `ActorSystem::on_connection_closed`, synthesizing a clean
    /// `connectionClosed` for every outstanding call and stream rather
    /// than leaving them to time out), then the transport. Background
    /// watcher tasks observe the resulting `Disconnected` state on their
    /// next tick and skip their work; they are not themselves aborted by
    /// this call, matching the rest of dispatch's reconnect-oriented
    /// design, where the watchers are meant to outlive any single session.
    pub async fn shutdown(&self) {
        self.actor_system.on_connection_closed().await;
        if let Err(err) = self.transport.shutdown().await {
            warn!(%err, "transport shutdown reported an error");
        }
        *self.state.lock() = ConnectionState::Disconnected;
    }

    /// Sends a periodic keepalive ping while connected, so an idle
    /// session's death is caught here rather than by the next caller's
    /// `remote_call` (spec §4.5 "Connection health"). A failed ping is
    /// treated the same as any other observed `connectionClosed`.
    fn spawn_ping_watcher(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(PING_INTERVAL).await;
                if self.state() != ConnectionState::Connected {
                    continue;
                }
                if let Err(err) = self.transport.ping(&self.endpoint).await {
                    warn!(%err, "keepalive ping failed, triggering reconnection");
                    self.notify_disconnected();
                }
            }
        });
    }

    /// Delegates to [`ActorSystem::remote_call`]; a `connectionClosed`
    /// result triggers this client's reconnection state machine (the
    /// call itself is not retried here — the caller decides whether to
    /// retry once reconnected).
    pub async fn call(
        self: &Arc<Self>,
        actor: &ActorId,
        target: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<Vec<u8>, CoreError> {
        let result = self.actor_system.remote_call(actor, target, args).await;
        if matches!(result, Err(CoreError::ConnectionClosed)) {
            debug!("remote_call observed connectionClosed, triggering reconnection");
            self.notify_disconnected();
        }
        result
    }

    pub async fn call_stream(
        self: &Arc<Self>,
        actor: &ActorId,
        target: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<StreamConsumer, CoreError> {
        let result = self.actor_system.remote_call_stream(actor, target, args).await;
        if matches!(result, Err(CoreError::ConnectionClosed)) {
            self.notify_disconnected();
        }
        result
    }
}
