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

use async_trait::async_trait;
use meridian_common::Endpoint;
use meridian_metrics::{Collector, MetricsCollector};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::rustls::{Certificate, PrivateKey, ServerConfig};
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::config::{TlsMaterial, TransportConfiguration};
use crate::error::{TransportError, TransportResult};
use crate::message::TransportMessage;
use crate::pool::ConnectionPool;
use crate::session::Session;
use crate::transport::{IncomingMessages, Transport};

/// The core's primary transport binding: secure WebSocket, built on
/// `tokio-tungstenite` (spec §4.3). Frames are binary; `ping` is answered
/// with `pong`; a `connectionClose` frame triggers orderly teardown of
/// that session only.
pub struct WebSocketTransport {
    pool: ConnectionPool,
    inbound_tx: mpsc::Sender<TransportMessage>,
    inbound_rx: Mutex<Option<mpsc::Receiver<TransportMessage>>>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
    accepted_sessions: Mutex<Vec<Arc<Session>>>,
}

impl WebSocketTransport {
    pub fn new(inbound_capacity: usize) -> Arc<Self> {
        Self::new_with_metrics(inbound_capacity, Arc::new(MetricsCollector::default()))
    }

    /// Same as [`Self::new`], but records connection-pool metrics
    /// (`connections.active`/`connections.total`, spec §4.7) to the given
    /// collector instead of a private, unshared default.
    pub fn new_with_metrics(inbound_capacity: usize, metrics: Arc<dyn Collector>) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity);
        Arc::new(Self {
            pool: ConnectionPool::new_with_metrics(inbound_tx.clone(), inbound_capacity, metrics),
            inbound_tx,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            listener_task: Mutex::new(None),
            accepted_sessions: Mutex::new(Vec::new()),
        })
    }

    fn build_tls_acceptor(tls: &TlsMaterial) -> TransportResult<TlsAcceptor> {
        let mut cert_reader = std::io::Cursor::new(&tls.cert_chain_pem);
        let certs = rustls_pemfile::certs(&mut cert_reader)
            .map_err(|e| TransportError::InvalidConfiguration(format!("bad cert chain: {e}")))?
            .into_iter()
            .map(Certificate)
            .collect::<Vec<_>>();

        let mut key_reader = std::io::Cursor::new(&tls.private_key_pem);
        let mut keys = rustls_pemfile::pkcs8_private_keys(&mut key_reader)
            .map_err(|e| TransportError::InvalidConfiguration(format!("bad private key: {e}")))?;
        let key = keys
            .pop()
            .ok_or_else(|| TransportError::InvalidConfiguration("no private key in PEM".into()))?;

        // `ServerConfig::builder()` with rustls 0.21 defaults its minimum
        // protocol version floor to TLS 1.2, matching the spec's
        // requirement (spec §4.3).
        let config = ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(certs, PrivateKey(key))
            .map_err(|e| TransportError::InvalidConfiguration(e.to_string()))?;

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, data: Vec<u8>, endpoint: Endpoint) -> TransportResult<()> {
        let session = self.pool.get_or_connect(&endpoint).await?;
        session.send(data).await
    }

    async fn connect(&self, endpoint: Endpoint) -> TransportResult<()> {
        self.pool.get_or_connect(&endpoint).await?;
        Ok(())
    }

    fn disconnect(&self, endpoint: &Endpoint) {
        self.pool.remove(endpoint);
    }

    async fn ping(&self, endpoint: &Endpoint) -> TransportResult<()> {
        self.pool.ping(endpoint).await
    }

    async fn listen(&self, endpoint: Endpoint) -> TransportResult<()> {
        self.listen_configured(&TransportConfiguration::WebSocket {
            host: endpoint.host,
            port: endpoint.port,
            tls: None,
        })
        .await
    }

    async fn shutdown(&self) -> TransportResult<()> {
        self.pool.shutdown_all();
        for session in self.accepted_sessions.lock().drain(..) {
            session.close();
        }
        if let Some(task) = self.listener_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    fn incoming(&self) -> IncomingMessages {
        let receiver = self
            .inbound_rx
            .lock()
            .take()
            .expect("Transport::incoming called more than once; inbound sequence has one consumer");
        tokio_stream::wrappers::ReceiverStream::new(receiver)
    }
}

impl WebSocketTransport {
    /// Entry point used when TLS material is required; [`Transport::listen`]
    /// calls this with `tls: None`.
    pub async fn listen_configured(
        self: &Arc<Self>,
        config: &TransportConfiguration,
    ) -> TransportResult<()> {
        let host = config.host().to_string();
        let port = config.port();
        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|e| TransportError::BindFailed {
                host: host.clone(),
                port,
                underlying: e.to_string(),
            })?;

        let tls_acceptor = match config {
            TransportConfiguration::WebSocket { tls: Some(tls), .. } => {
                Some(Self::build_tls_acceptor(tls)?)
            }
            _ => None,
        };

        let this = self.clone();
        let task = tokio::spawn(async move {
            loop {
                let (tcp, peer_addr) = match listener.accept().await {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "accept failed, listener stopping");
                        break;
                    }
                };
                let peer = Endpoint::new(peer_addr.ip().to_string(), peer_addr.port());
                let this = this.clone();
                let acceptor = tls_acceptor.clone();
                tokio::spawn(async move {
                    if let Err(err) = this.accept_one(tcp, peer, acceptor).await {
                        warn!(error = %err, "failed to complete inbound websocket handshake");
                    }
                });
            }
        });
        *self.listener_task.lock() = Some(task);
        info!(%host, port, "websocket transport listening");
        Ok(())
    }

    async fn accept_one(
        self: Arc<Self>,
        tcp: tokio::net::TcpStream,
        peer: Endpoint,
        tls_acceptor: Option<TlsAcceptor>,
    ) -> TransportResult<()> {
        let session = match tls_acceptor {
            None => {
                let ws = tokio_tungstenite::accept_async(tcp)
                    .await
                    .map_err(|e| TransportError::ConnectionFailed {
                        host: peer.host.clone(),
                        port: peer.port,
                        underlying: e.to_string(),
                    })?;
                Session::spawn(ws, Some(peer), self.inbound_tx.clone(), 256)
            }
            Some(acceptor) => {
                let tls_stream =
                    acceptor
                        .accept(tcp)
                        .await
                        .map_err(|e| TransportError::ConnectionFailed {
                            host: peer.host.clone(),
                            port: peer.port,
                            underlying: e.to_string(),
                        })?;
                let ws = tokio_tungstenite::accept_async(tls_stream).await.map_err(|e| {
                    TransportError::ConnectionFailed {
                        host: peer.host.clone(),
                        port: peer.port,
                        underlying: e.to_string(),
                    }
                })?;
                Session::spawn(ws, Some(peer), self.inbound_tx.clone(), 256)
            }
        };
        self.accepted_sessions.lock().push(Arc::new(session));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn ping_is_a_no_op_with_no_open_session() {
        let transport = WebSocketTransport::new(4);
        let endpoint = Endpoint::new("127.0.0.1", 19241);
        transport.ping(&endpoint).await.unwrap();
    }

    #[tokio::test]
    async fn ping_succeeds_on_an_open_session() {
        let server = WebSocketTransport::new(4);
        let endpoint = Endpoint::new("127.0.0.1", 19242);
        server.listen(endpoint.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let client = WebSocketTransport::new(4);
        client.connect(endpoint.clone()).await.unwrap();
        client.ping(&endpoint).await.unwrap();
    }
}
