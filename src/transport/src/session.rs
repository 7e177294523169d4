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

use futures::{SinkExt, StreamExt};
use meridian_common::Endpoint;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::error::{TransportError, TransportResult};
use crate::message::{RespondHandle, TransportMessage};

/// One live WebSocket connection: a background writer draining an
/// outbound queue and a background reader feeding the shared inbound
/// channel. Used both for outbound sessions held by the [`ConnectionPool`]
/// and for sessions accepted by a listener. Generic over the underlying
/// byte stream so plain and TLS-wrapped sockets share one code path.
pub struct Session {
    outbound_tx: mpsc::Sender<WsMessage>,
    writer_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
}

impl Session {
    /// Splits `stream` and spawns its reader/writer tasks. Inbound binary
    /// frames are forwarded to `inbound_tx` tagged with `peer`; `Ping`
    /// frames are answered with `Pong` and `Close` ends the reader loop.
    pub(crate) fn spawn<S>(
        stream: WebSocketStream<S>,
        peer: Option<Endpoint>,
        inbound_tx: mpsc::Sender<TransportMessage>,
        outbound_capacity: usize,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut sink, mut stream) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<WsMessage>(outbound_capacity);

        let writer_task = tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if let Err(err) = sink.send(msg).await {
                    warn!(error = %err, "websocket write failed, closing session");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let respond = RespondHandle::new(outbound_tx.clone());
        let reader_task = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(WsMessage::Binary(bytes)) => {
                        let message = TransportMessage {
                            bytes,
                            source: peer.clone(),
                            respond: respond.clone(),
                        };
                        if inbound_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Text(text)) => {
                        let message = TransportMessage {
                            bytes: text.into_bytes(),
                            source: peer.clone(),
                            respond: respond.clone(),
                        };
                        if inbound_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Ping(payload)) => {
                        if respond.respond_raw(WsMessage::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsMessage::Pong(_)) => {}
                    Ok(WsMessage::Close(_)) => {
                        debug!("peer closed websocket connection");
                        break;
                    }
                    Ok(WsMessage::Frame(_)) => {}
                    Err(err) => {
                        warn!(error = %err, "websocket read error, ending session");
                        break;
                    }
                }
            }
        });

        Self {
            outbound_tx,
            writer_task,
            reader_task,
        }
    }

    pub async fn send(&self, data: Vec<u8>) -> TransportResult<()> {
        self.outbound_tx
            .send(WsMessage::Binary(data))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    /// Sends a protocol-level `Ping`, so a connection with no application
    /// traffic still surfaces a dead peer before the next real `send`.
    pub async fn ping(&self) -> TransportResult<()> {
        self.outbound_tx
            .send(WsMessage::Ping(Vec::new()))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    pub fn close(&self) {
        self.writer_task.abort();
        self.reader_task.abort();
    }
}

impl RespondHandle {
    pub(crate) async fn respond_raw(&self, msg: WsMessage) -> TransportResult<()> {
        self.raw_sender()
            .send(msg)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}
