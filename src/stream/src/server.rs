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

use chrono::Utc;
use dashmap::DashMap;
use meridian_common::{
    ActorId, StreamDataEnvelope, StreamEndEnvelope, StreamErrorEnvelope, StreamFilterDescriptor,
    TerminationReason, TransportEnvelope,
};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

use crate::filter::{FilterRegistry, StreamFilter};
use crate::replay::ReplayBuffer;
use crate::sink::StreamSink;

/// Outcome of a `streamResume` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The replay buffer still covered the gap; the consumer observes the
    /// missing entries in order, then live production continues.
    Replayed,
    /// The buffer had evicted past the checkpoint, or the stream id is no
    /// longer known; the caller must treat this as a fresh invocation.
    RestartRequired,
}

struct StreamEntry {
    actor: ActorId,
    method: String,
    replay: ReplayBuffer,
    sink: Option<Arc<dyn StreamSink>>,
    filter: Option<(Arc<dyn StreamFilter>, HashMap<String, String>)>,
    next_sequence: u64,
}

/// Server-owned table of active streams (spec §3 "Stream table (server
/// side)"): replay buffers, the producer's current destination session,
/// and resume handling.
pub struct ServerStreamTable {
    capacity: usize,
    filters: FilterRegistry,
    streams: DashMap<Uuid, Arc<Mutex<StreamEntry>>>,
}

impl ServerStreamTable {
    pub fn new(capacity: usize, filters: FilterRegistry) -> Self {
        Self {
            capacity,
            filters,
            streams: DashMap::new(),
        }
    }

    /// Registers a freshly opened stream. Callers emit the `StreamStart`
    /// envelope themselves; this only prepares the table to receive pushes.
    pub fn open(
        &self,
        stream_id: Uuid,
        actor: ActorId,
        method: String,
        filter_descriptor: Option<StreamFilterDescriptor>,
        sink: Arc<dyn StreamSink>,
    ) {
        let filter = filter_descriptor.and_then(|descriptor| {
            self.filters
                .get(&descriptor.name)
                .map(|filter| (filter, descriptor.params))
        });
        self.streams.insert(
            stream_id,
            Arc::new(Mutex::new(StreamEntry {
                actor,
                method,
                replay: ReplayBuffer::new(self.capacity),
                sink: Some(sink),
                filter,
                next_sequence: 1,
            })),
        );
    }

    /// Applies the stream's filter (if any), assigns the next sequence
    /// number, buffers it for replay, and forwards it to the current sink.
    /// A filter returning `None` suppresses the payload with no sequence
    /// consumed. Silently a no-op if the stream has already ended.
    pub async fn push(&self, stream_id: Uuid, raw_payload: Vec<u8>) {
        let Some(entry_arc) = self.streams.get(&stream_id).map(|e| e.clone()) else {
            return;
        };
        let mut entry = entry_arc.lock().await;
        let payload = match &entry.filter {
            Some((filter, params)) => match filter.apply(&raw_payload, params) {
                Some(transformed) => transformed,
                None => return,
            },
            None => raw_payload,
        };

        let sequence_number = entry.next_sequence;
        entry.next_sequence += 1;
        entry.replay.push(sequence_number, payload.clone());

        if let Some(sink) = entry.sink.clone() {
            let envelope = TransportEnvelope::StreamData(StreamDataEnvelope {
                stream_id,
                sequence_number,
                payload,
                timestamp: Utc::now(),
            });
            if sink.send(envelope).await.is_err() {
                entry.sink = None;
            }
        }
    }

    pub async fn end(&self, stream_id: Uuid, reason: TerminationReason) {
        if let Some((_, entry_arc)) = self.streams.remove(&stream_id) {
            let entry = entry_arc.lock().await;
            if let Some(sink) = &entry.sink {
                let _ = sink
                    .send(TransportEnvelope::StreamEnd(StreamEndEnvelope {
                        stream_id,
                        reason,
                    }))
                    .await;
            }
        }
    }

    pub async fn fail(&self, stream_id: Uuid, message: String) {
        if let Some((_, entry_arc)) = self.streams.remove(&stream_id) {
            let entry = entry_arc.lock().await;
            if let Some(sink) = &entry.sink {
                let _ = sink
                    .send(TransportEnvelope::StreamError(StreamErrorEnvelope {
                        stream_id,
                        message,
                    }))
                    .await;
            }
        }
    }

    /// Ends every stream hosted by `actor` with reason `actorTerminated`
    /// (the actor was unexposed or destroyed).
    pub async fn terminate_for_actor(&self, actor: &ActorId) {
        let matching: Vec<Uuid> = self
            .streams
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .try_lock()
                    .map(|e| &e.actor == actor)
                    .unwrap_or(false)
            })
            .map(|entry| *entry.key())
            .collect();
        for stream_id in matching {
            self.end(stream_id, TerminationReason::ActorTerminated).await;
        }
    }

    /// Ends every stream still hosted by this table with reason
    /// `connectionClosed`, for orderly shutdown: the registry goes first
    /// so every consumer observes a clean `streamEnd` instead of the
    /// session simply vanishing underneath it.
    pub async fn terminate_all(&self) {
        let stream_ids: Vec<Uuid> = self.streams.iter().map(|entry| *entry.key()).collect();
        for stream_id in stream_ids {
            self.end(stream_id, TerminationReason::ConnectionClosed).await;
        }
    }

    /// The `(actor, method)` a restart-required resume should re-invoke.
    pub async fn actor_and_method(&self, stream_id: Uuid) -> Option<(ActorId, String)> {
        let entry_arc = self.streams.get(&stream_id)?.clone();
        let entry = entry_arc.lock().await;
        Some((entry.actor.clone(), entry.method.clone()))
    }

    /// Handles a `StreamResume` (spec §4.2): replays buffered entries newer
    /// than `last_sequence` into `new_sink` and, on success, makes it the
    /// stream's live destination.
    pub async fn resume(
        &self,
        stream_id: Uuid,
        last_sequence: u64,
        new_sink: Arc<dyn StreamSink>,
    ) -> ResumeOutcome {
        let Some(entry_arc) = self.streams.get(&stream_id).map(|e| e.clone()) else {
            return ResumeOutcome::RestartRequired;
        };
        let mut entry = entry_arc.lock().await;

        if last_sequence + 1 >= entry.next_sequence {
            entry.sink = Some(new_sink);
            return ResumeOutcome::Replayed;
        }

        let missing = match entry.replay.front_sequence() {
            Some(oldest) if oldest <= last_sequence + 1 => entry.replay.entries_after(last_sequence),
            _ => {
                warn!(%stream_id, last_sequence, "replay buffer overflowed past checkpoint");
                return ResumeOutcome::RestartRequired;
            }
        };

        for (sequence_number, payload) in missing {
            let envelope = TransportEnvelope::StreamData(StreamDataEnvelope {
                stream_id,
                sequence_number,
                payload,
                timestamp: Utc::now(),
            });
            if new_sink.send(envelope).await.is_err() {
                return ResumeOutcome::RestartRequired;
            }
        }
        entry.sink = Some(new_sink);
        ResumeOutcome::Replayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::Endpoint;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    struct RecordingSink {
        received: TokioMutex<Vec<TransportEnvelope>>,
        fail_after: AtomicUsize,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                received: TokioMutex::new(Vec::new()),
                fail_after: AtomicUsize::new(usize::MAX),
            })
        }
    }

    #[async_trait::async_trait]
    impl StreamSink for RecordingSink {
        async fn send(&self, envelope: TransportEnvelope) -> Result<(), meridian_common::CoreError> {
            if self.fail_after.load(Ordering::SeqCst) == 0 {
                return Err(meridian_common::CoreError::ConnectionClosed);
            }
            self.fail_after.fetch_sub(1, Ordering::SeqCst);
            self.received.lock().await.push(envelope);
            Ok(())
        }
    }

    fn test_actor() -> ActorId {
        ActorId::remote("room", Endpoint::new("localhost", 9000))
    }

    #[tokio::test]
    async fn replay_covers_buffered_gap() {
        let table = ServerStreamTable::new(5, FilterRegistry::new());
        let stream_id = Uuid::new_v4();
        let sink = RecordingSink::new();
        table.open(stream_id, test_actor(), "observeState".into(), None, sink.clone());
        for n in 1..=10u8 {
            table.push(stream_id, vec![n]).await;
        }

        let new_sink = RecordingSink::new();
        let outcome = table.resume(stream_id, 4, new_sink.clone()).await;
        assert_eq!(outcome, ResumeOutcome::Replayed);
        let replayed = new_sink.received.lock().await;
        let sequences: Vec<u64> = replayed
            .iter()
            .map(|e| match e {
                TransportEnvelope::StreamData(d) => d.sequence_number,
                _ => panic!("expected stream data"),
            })
            .collect();
        assert_eq!(sequences, vec![5, 6, 7, 8, 9, 10]);
    }

    #[tokio::test]
    async fn overflowed_buffer_requires_restart() {
        let table = ServerStreamTable::new(5, FilterRegistry::new());
        let stream_id = Uuid::new_v4();
        let sink = RecordingSink::new();
        table.open(stream_id, test_actor(), "observeState".into(), None, sink);
        for n in 1..=20u8 {
            table.push(stream_id, vec![n]).await;
        }

        let new_sink = RecordingSink::new();
        let outcome = table.resume(stream_id, 4, new_sink).await;
        assert_eq!(outcome, ResumeOutcome::RestartRequired);
    }

    #[tokio::test]
    async fn unknown_stream_id_requires_restart() {
        let table = ServerStreamTable::new(5, FilterRegistry::new());
        let new_sink = RecordingSink::new();
        let outcome = table.resume(Uuid::new_v4(), 0, new_sink).await;
        assert_eq!(outcome, ResumeOutcome::RestartRequired);
    }
}
