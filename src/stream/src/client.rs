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

use std::collections::BTreeMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::Stream;
use meridian_common::{
    ActorId, CoreError, StreamDataEnvelope, StreamEndEnvelope, StreamErrorEnvelope,
    StreamResumeEnvelope, StreamStartEnvelope, TerminationReason,
};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::checkpoint::Checkpoint;

/// One item delivered to a stream consumer: a payload in sequence, or a
/// terminal outcome (spec §4.2 "Client delivery contract").
#[derive(Debug, Clone)]
pub enum StreamItem {
    Data(Vec<u8>),
    End(TerminationReason),
    Error(String),
}

/// Handed back from `remoteCallStream` once the server's `StreamStart` is
/// observed. A lazy, ordered, deduplicated sequence of [`StreamItem`]s.
pub struct StreamConsumer {
    pub stream_id: Uuid,
    inner: ReceiverStream<StreamItem>,
}

impl Stream for StreamConsumer {
    type Item = StreamItem;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

struct PendingOpen {
    id_tx: oneshot::Sender<Result<Uuid, CoreError>>,
    item_tx: mpsc::Sender<StreamItem>,
    capacity: usize,
}

struct ClientStreamState {
    actor: ActorId,
    method: String,
    last_delivered: u64,
    pending_buffer: BTreeMap<u64, Vec<u8>>,
    sender: mpsc::Sender<StreamItem>,
    last_progress: Instant,
}

/// Client-owned table of active streams (spec §3 "Stream table (client
/// side)"): gap detection, dedup, in-order delivery, and checkpoints used
/// to resume after a reconnect.
#[derive(Default)]
pub struct ClientStreamTable {
    pending_opens: DashMap<Uuid, PendingOpen>,
    streams: DashMap<Uuid, Mutex<ClientStreamState>>,
}

impl ClientStreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers interest in the stream a just-dispatched `call_id` will
    /// open. Returns a receiver for the eventual stream id (or an error if
    /// the connection drops before `StreamStart` arrives) and the item
    /// channel the resulting [`StreamConsumer`] will read from.
    pub fn register_open(
        &self,
        call_id: Uuid,
        capacity: usize,
    ) -> (oneshot::Receiver<Result<Uuid, CoreError>>, mpsc::Receiver<StreamItem>) {
        let (item_tx, item_rx) = mpsc::channel(capacity);
        let (id_tx, id_rx) = oneshot::channel();
        self.pending_opens.insert(
            call_id,
            PendingOpen {
                id_tx,
                item_tx,
                capacity,
            },
        );
        (id_rx, item_rx)
    }

    /// Withdraws a pending open without waiting for `StreamStart`, used
    /// when the invocation that would have opened it never reached the
    /// transport.
    pub fn cancel_open(&self, call_id: Uuid) {
        self.pending_opens.remove(&call_id);
    }

    pub fn on_stream_start(&self, envelope: StreamStartEnvelope) {
        let Some((_, pending)) = self.pending_opens.remove(&envelope.call_id) else {
            tracing::warn!(call_id = %envelope.call_id, "streamStart for unknown pending open, dropping");
            return;
        };
        self.streams.insert(
            envelope.stream_id,
            Mutex::new(ClientStreamState {
                actor: envelope.actor,
                method: envelope.target,
                last_delivered: 0,
                pending_buffer: BTreeMap::new(),
                sender: pending.item_tx,
                last_progress: Instant::now(),
            }),
        );
        let _ = pending.id_tx.send(Ok(envelope.stream_id));
    }

    /// Delivers contiguous data in order, drops duplicates, and buffers
    /// out-of-order arrivals until the gap fills (spec §4.2).
    pub async fn on_stream_data(&self, envelope: StreamDataEnvelope) {
        let Some(state_lock) = self.streams.get(&envelope.stream_id) else {
            return;
        };
        let mut state = state_lock.lock().await;
        if envelope.sequence_number <= state.last_delivered {
            return; // duplicate, already delivered or superseded
        }
        if envelope.sequence_number == state.last_delivered + 1 {
            let _ = state.sender.send(StreamItem::Data(envelope.payload)).await;
            state.last_delivered = envelope.sequence_number;
            state.last_progress = Instant::now();
            while let Some(next) = state.pending_buffer.remove(&(state.last_delivered + 1)) {
                let _ = state.sender.send(StreamItem::Data(next)).await;
                state.last_delivered += 1;
            }
        } else {
            state.pending_buffer.insert(envelope.sequence_number, envelope.payload);
        }
    }

    pub async fn on_stream_end(&self, envelope: StreamEndEnvelope) {
        if let Some((_, state)) = self.streams.remove(&envelope.stream_id) {
            let state = state.into_inner();
            let _ = state.sender.send(StreamItem::End(envelope.reason)).await;
        }
    }

    pub async fn on_stream_error(&self, envelope: StreamErrorEnvelope) {
        if let Some((_, state)) = self.streams.remove(&envelope.stream_id) {
            let state = state.into_inner();
            let _ = state.sender.send(StreamItem::Error(envelope.message)).await;
        }
    }

    /// Transport-level loss: every pending open fails, every active stream
    /// observes a synthesized `connectionClosed` end (spec §4.2).
    pub async fn synthesize_connection_closed(&self) {
        let pending: Vec<Uuid> = self.pending_opens.iter().map(|e| *e.key()).collect();
        for call_id in pending {
            if let Some((_, pending)) = self.pending_opens.remove(&call_id) {
                let _ = pending.id_tx.send(Err(CoreError::ConnectionClosed));
            }
        }
        let active: Vec<Uuid> = self.streams.iter().map(|e| *e.key()).collect();
        for stream_id in active {
            if let Some((_, state)) = self.streams.remove(&stream_id) {
                let state = state.into_inner();
                let _ = state
                    .sender
                    .send(StreamItem::End(TerminationReason::ConnectionClosed))
                    .await;
            }
        }
    }

    /// Checkpoints for every stream still active, used to emit a
    /// `streamResume` per stream after a reconnect (spec §4.5).
    pub async fn checkpoints(&self) -> Vec<Checkpoint> {
        let mut checkpoints = Vec::new();
        for entry in self.streams.iter() {
            let state = entry.value().lock().await;
            checkpoints.push(Checkpoint {
                stream_id: *entry.key(),
                last_sequence: state.last_delivered,
                method: state.method.clone(),
                actor: state.actor.clone(),
            });
        }
        checkpoints
    }

    /// Streams with a gap that has sat unfilled longer than `timeout`; the
    /// caller should emit a [`StreamResumeEnvelope`] for each (spec §4.2
    /// "Gap handling").
    pub fn stale_gaps(&self, timeout: Duration) -> Vec<StreamResumeEnvelope> {
        let now = Instant::now();
        self.streams
            .iter()
            .filter_map(|entry| {
                let state = entry.value().try_lock().ok()?;
                if !state.pending_buffer.is_empty() && now.duration_since(state.last_progress) >= timeout
                {
                    Some(StreamResumeEnvelope {
                        stream_id: *entry.key(),
                        last_sequence: state.last_delivered,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Wraps a completed `register_open` pair into a lazy [`StreamConsumer`],
/// waiting for the stream id to arrive via `StreamStart`.
pub async fn await_stream_open(
    id_rx: oneshot::Receiver<Result<Uuid, CoreError>>,
    item_rx: mpsc::Receiver<StreamItem>,
) -> Result<StreamConsumer, CoreError> {
    let stream_id = id_rx.await.map_err(|_| CoreError::ConnectionClosed)??;
    Ok(StreamConsumer {
        stream_id,
        inner: ReceiverStream::new(item_rx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use meridian_common::Endpoint;

    fn actor() -> ActorId {
        ActorId::remote("room", Endpoint::new("localhost", 9000))
    }

    #[tokio::test]
    async fn delivers_in_order_and_drops_duplicates() {
        let table = ClientStreamTable::new();
        let call_id = Uuid::new_v4();
        let (id_rx, item_rx) = table.register_open(call_id, 16);
        let stream_id = Uuid::new_v4();
        table.on_stream_start(StreamStartEnvelope {
            stream_id,
            call_id,
            actor: actor(),
            target: "observeState".into(),
        });

        let mut consumer = await_stream_open(id_rx, item_rx).await.unwrap();
        assert_eq!(consumer.stream_id, stream_id);

        for seq in [1u64, 2, 2, 3] {
            table
                .on_stream_data(StreamDataEnvelope {
                    stream_id,
                    sequence_number: seq,
                    payload: vec![seq as u8],
                    timestamp: chrono::Utc::now(),
                })
                .await;
        }
        table
            .on_stream_end(StreamEndEnvelope {
                stream_id,
                reason: TerminationReason::Completed,
            })
            .await;

        let mut delivered = Vec::new();
        while let Some(item) = consumer.next().await {
            match item {
                StreamItem::Data(bytes) => delivered.push(bytes[0]),
                StreamItem::End(reason) => {
                    assert_eq!(reason, TerminationReason::Completed);
                    break;
                }
                StreamItem::Error(_) => panic!("unexpected error"),
            }
        }
        assert_eq!(delivered, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn out_of_order_arrival_is_buffered_then_drained() {
        let table = ClientStreamTable::new();
        let call_id = Uuid::new_v4();
        let (id_rx, item_rx) = table.register_open(call_id, 16);
        let stream_id = Uuid::new_v4();
        table.on_stream_start(StreamStartEnvelope {
            stream_id,
            call_id,
            actor: actor(),
            target: "observeState".into(),
        });
        let mut consumer = await_stream_open(id_rx, item_rx).await.unwrap();

        for seq in [1u64, 3, 2] {
            table
                .on_stream_data(StreamDataEnvelope {
                    stream_id,
                    sequence_number: seq,
                    payload: vec![seq as u8],
                    timestamp: chrono::Utc::now(),
                })
                .await;
        }
        let mut delivered = Vec::new();
        for _ in 0..3 {
            if let Some(StreamItem::Data(bytes)) = consumer.next().await {
                delivered.push(bytes[0]);
            }
        }
        assert_eq!(delivered, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn connection_loss_ends_active_streams_and_fails_pending_opens() {
        let table = ClientStreamTable::new();
        let call_id = Uuid::new_v4();
        let (id_rx, item_rx) = table.register_open(call_id, 16);
        let stream_id = Uuid::new_v4();
        table.on_stream_start(StreamStartEnvelope {
            stream_id,
            call_id,
            actor: actor(),
            target: "observeState".into(),
        });
        let mut consumer = await_stream_open(id_rx, item_rx).await.unwrap();

        let pending_call_id = Uuid::new_v4();
        let (pending_id_rx, _pending_item_rx) = table.register_open(pending_call_id, 4);

        table.synthesize_connection_closed().await;

        match consumer.next().await {
            Some(StreamItem::End(TerminationReason::ConnectionClosed)) => {}
            other => panic!("expected synthesized connectionClosed, got {other:?}"),
        }
        assert!(pending_id_rx.await.unwrap().is_err());
    }
}
