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

use std::sync::{Arc, RwLock};

use futures::StreamExt;
use meridian_actor::{ActorSystem, LocalActor};
use meridian_common::{
    ActorId, CoreError, InvocationEnvelope, ResponseEnvelope, StreamResumeEnvelope,
    StreamStartEnvelope, TerminationReason, TransportEnvelope,
};
use meridian_stream::{FilterRegistry, ResumeOutcome, ServerStreamTable, StreamSink};
use meridian_transport::{RespondHandle, Transport, TransportMessage};
use tracing::warn;
use uuid::Uuid;

use crate::registry::ExposedActorRegistry;
use crate::sink::RespondSink;

/// Invoked the first time an unknown actor id arrives; may register a new
/// actor under that id before dispatch retries resolution (spec §4.4
/// "Dynamic exposure").
pub type OnActorRequest = Arc<dyn Fn(&ActorId) + Send + Sync>;

/// Inbound dispatch (spec §4.4): decodes the outermost envelope tag,
/// routes invocations and stream resumes, responds on the session the
/// message arrived on.
pub struct Server {
    actor_system: Arc<ActorSystem>,
    transport: Arc<dyn Transport>,
    exposed: ExposedActorRegistry,
    streams: Arc<ServerStreamTable>,
    on_actor_request: RwLock<Option<OnActorRequest>>,
}

impl Server {
    pub fn new(
        actor_system: Arc<ActorSystem>,
        transport: Arc<dyn Transport>,
        replay_buffer_capacity: usize,
        filters: FilterRegistry,
    ) -> Arc<Self> {
        Arc::new(Self {
            actor_system,
            transport,
            exposed: ExposedActorRegistry::new(),
            streams: Arc::new(ServerStreamTable::new(replay_buffer_capacity, filters)),
            on_actor_request: RwLock::new(None),
        })
    }

    pub fn expose(&self, name: impl Into<String>, id: ActorId) {
        self.exposed.expose(name, id);
    }

    /// Removes the alias and ends every stream it was hosting with reason
    /// `actorTerminated` (spec §3, §4.2).
    pub async fn unexpose(&self, name: &str) -> Option<ActorId> {
        let id = self.exposed.unexpose(name)?;
        self.streams.terminate_for_actor(&id).await;
        Some(id)
    }

    pub fn set_on_actor_request(&self, callback: OnActorRequest) {
        *self.on_actor_request.write().unwrap() = Some(callback);
    }

    /// Tears down, in order, every child component this server owns: the
    /// stream registry (so every open stream gets a clean `streamEnd`
    /// rather than silently dying), then the transport (closing every
    /// session and ending `incoming`). Idempotent at the transport layer;
    /// calling this twice is harmless.
    pub async fn shutdown(&self) {
        self.streams.terminate_all().await;
        if let Err(err) = self.transport.shutdown().await {
            warn!(%err, "transport shutdown reported an error");
        }
    }

    /// Drives the inbound message sequence until the transport closes it.
    /// Each message is handled on its own task so a slow handler cannot
    /// stall delivery to other sessions.
    pub async fn run(self: Arc<Self>) {
        let mut incoming = self.transport.incoming();
        while let Some(message) = incoming.next().await {
            let this = self.clone();
            tokio::spawn(async move {
                this.handle_message(message).await;
            });
        }
    }

    async fn handle_message(&self, message: TransportMessage) {
        let envelope: TransportEnvelope = match serde_json::from_slice(&message.bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(%err, "failed to decode inbound envelope");
                if let Some(call_id) = extract_call_id_best_effort(&message.bytes) {
                    respond_failure(&message.respond, call_id, format!("malformed envelope: {err}")).await;
                }
                return;
            }
        };

        match envelope {
            TransportEnvelope::Invocation(invocation) => {
                self.handle_invocation(invocation, message.respond).await
            }
            TransportEnvelope::StreamResume(resume) => {
                self.handle_resume(resume, message.respond).await
            }
            other => {
                warn!(kind = envelope_kind(&other), "envelope kind invalid on server side, dropping");
            }
        }
    }

    async fn handle_invocation(&self, mut envelope: InvocationEnvelope, respond: RespondHandle) {
        if let Some(resolved) = self.exposed.resolve(&envelope.actor.id) {
            envelope.actor = resolved;
        }

        let mut local = self.actor_system.local_actor(&envelope.actor);
        if local.is_none() {
            let callback = self.on_actor_request.read().unwrap().clone();
            if let Some(callback) = callback {
                callback(&envelope.actor);
                local = self.actor_system.local_actor(&envelope.actor);
            }
        }

        let Some(local_actor) = local else {
            respond_failure(
                &respond,
                envelope.call_id,
                CoreError::ActorNotFound(envelope.actor.to_string()).to_string(),
            )
            .await;
            return;
        };

        if self.actor_system.is_stream_opener(&envelope.target) {
            self.open_stream(envelope, local_actor, respond).await;
        } else {
            let result = self
                .actor_system
                .execute_target(&envelope, local_actor.as_ref())
                .await;
            let response = match result {
                Ok(payload) => ResponseEnvelope::Success {
                    call_id: envelope.call_id,
                    result: payload,
                },
                Err(err) => ResponseEnvelope::Failure {
                    call_id: envelope.call_id,
                    error: err.to_string(),
                },
            };
            let _ = respond_envelope(&respond, TransportEnvelope::Response(response)).await;
        }
    }

    async fn open_stream(
        &self,
        envelope: InvocationEnvelope,
        local_actor: Arc<dyn LocalActor>,
        respond: RespondHandle,
    ) {
        let stream_id = Uuid::new_v4();
        let sink: Arc<dyn StreamSink> = Arc::new(RespondSink(respond));
        self.streams.open(
            stream_id,
            envelope.actor.clone(),
            envelope.target.clone(),
            envelope.stream_filter.clone(),
            sink.clone(),
        );

        let start = TransportEnvelope::StreamStart(StreamStartEnvelope {
            stream_id,
            call_id: envelope.call_id,
            actor: envelope.actor.clone(),
            target: envelope.target.clone(),
        });
        if sink.send(start).await.is_err() {
            self.streams.fail(stream_id, "session closed before streamStart".into()).await;
            return;
        }

        let mut producer = self
            .actor_system
            .execute_streaming_target(&envelope, local_actor.as_ref());
        let streams = self.streams.clone();
        tokio::spawn(async move {
            while let Some(item) = producer.next().await {
                match item {
                    Ok(payload) => streams.push(stream_id, payload).await,
                    Err(err) => {
                        streams.fail(stream_id, err.to_string()).await;
                        return;
                    }
                }
            }
            streams.end(stream_id, TerminationReason::Completed).await;
        });
    }

    async fn handle_resume(&self, resume: StreamResumeEnvelope, respond: RespondHandle) {
        let sink: Arc<dyn StreamSink> = Arc::new(RespondSink(respond));
        match self.streams.resume(resume.stream_id, resume.last_sequence, sink.clone()).await {
            ResumeOutcome::Replayed => {}
            ResumeOutcome::RestartRequired => self.restart_stream(resume.stream_id, sink).await,
        }
    }

    /// Allocates a new stream id and re-invokes the original method on the
    /// original actor (spec §4.2 "replay overflow fallback"). If the
    /// stream id was never known on this server, there is no recoverable
    /// method/actor pair to restart and the resume is dropped.
    async fn restart_stream(&self, stale_stream_id: Uuid, sink: Arc<dyn StreamSink>) {
        let Some((actor, method)) = self.streams.actor_and_method(stale_stream_id).await else {
            warn!(stream_id = %stale_stream_id, "streamResume for unknown stream id, cannot restart");
            return;
        };
        let Some(local_actor) = self.actor_system.local_actor(&actor) else {
            warn!(%actor, "streamResume restart target no longer registered");
            return;
        };

        let new_stream_id = Uuid::new_v4();
        self.streams.open(new_stream_id, actor.clone(), method.clone(), None, sink.clone());
        let call_id = Uuid::new_v4();
        let start = TransportEnvelope::StreamStart(StreamStartEnvelope {
            stream_id: new_stream_id,
            call_id,
            actor: actor.clone(),
            target: method.clone(),
        });
        if sink.send(start).await.is_err() {
            return;
        }

        let envelope = InvocationEnvelope {
            call_id,
            actor: actor.clone(),
            target: method,
            args: Vec::new(),
            generics: Vec::new(),
            trace_context: None,
            stream_filter: None,
        };
        let mut producer = self
            .actor_system
            .execute_streaming_target(&envelope, local_actor.as_ref());
        let streams = self.streams.clone();
        tokio::spawn(async move {
            while let Some(item) = producer.next().await {
                match item {
                    Ok(payload) => streams.push(new_stream_id, payload).await,
                    Err(err) => {
                        streams.fail(new_stream_id, err.to_string()).await;
                        return;
                    }
                }
            }
            streams.end(new_stream_id, TerminationReason::Completed).await;
        });
    }
}

async fn respond_envelope(respond: &RespondHandle, envelope: TransportEnvelope) -> Result<(), CoreError> {
    let bytes = serde_json::to_vec(&envelope).map_err(CoreError::serialization)?;
    respond.respond(bytes).await.map_err(CoreError::from)
}

async fn respond_failure(respond: &RespondHandle, call_id: Uuid, error: String) {
    let _ = respond_envelope(respond, TransportEnvelope::Response(ResponseEnvelope::Failure { call_id, error })).await;
}

/// Best-effort call id extraction for a message that failed to decode as
/// any known envelope shape, used only to shape an error response (spec
/// §4.4 "On decode failure").
fn extract_call_id_best_effort(bytes: &[u8]) -> Option<Uuid> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    value.get("call_id")?.as_str()?.parse().ok()
}

fn envelope_kind(envelope: &TransportEnvelope) -> &'static str {
    match envelope {
        TransportEnvelope::Invocation(_) => "invocation",
        TransportEnvelope::Response(_) => "response",
        TransportEnvelope::StreamStart(_) => "streamStart",
        TransportEnvelope::StreamData(_) => "streamData",
        TransportEnvelope::StreamEnd(_) => "streamEnd",
        TransportEnvelope::StreamError(_) => "streamError",
        TransportEnvelope::StreamResume(_) => "streamResume",
    }
}
