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

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use meridian_common::Endpoint;
use meridian_metrics::{names, Collector, MetricsCollector, Tags};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async_tls, MaybeTlsStream};
use tokio::net::TcpStream;

use crate::error::{TransportError, TransportResult};
use crate::message::TransportMessage;
use crate::session::Session;

/// One active outbound session per endpoint (spec §3, §4.3): lazily
/// created on first `send`, removed on close. A per-endpoint async mutex
/// guards the connect-or-reuse decision so concurrent first sends to the
/// same endpoint dial exactly once (double-checked lazy creation).
pub struct ConnectionPool {
    sessions: DashMap<Endpoint, Arc<Session>>,
    connecting: DashMap<Endpoint, Arc<AsyncMutex<()>>>,
    inbound_tx: mpsc::Sender<TransportMessage>,
    outbound_capacity: usize,
    metrics: Arc<dyn Collector>,
}

impl ConnectionPool {
    pub fn new(inbound_tx: mpsc::Sender<TransportMessage>, outbound_capacity: usize) -> Self {
        Self::new_with_metrics(inbound_tx, outbound_capacity, Arc::new(MetricsCollector::default()))
    }

    pub fn new_with_metrics(
        inbound_tx: mpsc::Sender<TransportMessage>,
        outbound_capacity: usize,
        metrics: Arc<dyn Collector>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            connecting: DashMap::new(),
            inbound_tx,
            outbound_capacity,
            metrics,
        }
    }

    fn record_connections_active(&self) {
        self.metrics
            .record_gauge(names::CONNECTIONS_ACTIVE, &Tags::new(), self.sessions.len() as f64);
    }

    pub async fn get_or_connect(&self, endpoint: &Endpoint) -> TransportResult<Arc<Session>> {
        if let Some(session) = self.sessions.get(endpoint) {
            return Ok(session.clone());
        }

        let lock = self
            .connecting
            .entry(endpoint.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check: another task may have finished connecting while we
        // waited for the per-endpoint lock.
        if let Some(session) = self.sessions.get(endpoint) {
            return Ok(session.clone());
        }

        let url = format!("ws://{}:{}", endpoint.host, endpoint.port);
        let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                host: endpoint.host.clone(),
                port: endpoint.port,
                underlying: e.to_string(),
            })?;
        let request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidConfiguration(e.to_string()))?;
        let (stream, _response) = client_async_tls(request, MaybeTlsStream::Plain(tcp))
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                host: endpoint.host.clone(),
                port: endpoint.port,
                underlying: e.to_string(),
            })?;

        let session = Arc::new(Session::spawn(
            stream,
            Some(endpoint.clone()),
            self.inbound_tx.clone(),
            self.outbound_capacity,
        ));
        self.sessions.insert(endpoint.clone(), session.clone());
        self.metrics.increment_counter(names::CONNECTIONS_TOTAL, &Tags::new(), 1);
        self.record_connections_active();
        Ok(session)
    }

    /// Sends a keepalive `Ping` on the session for `endpoint`, if one is
    /// open. A no-op when no session exists yet — there is nothing to
    /// keep alive, and this must never itself trigger a dial.
    pub async fn ping(&self, endpoint: &Endpoint) -> TransportResult<()> {
        match self.sessions.get(endpoint) {
            Some(session) => session.ping().await,
            None => Ok(()),
        }
    }

    /// Removes and closes a session, on explicit shutdown or a
    /// remote half-close observed by its reader task.
    pub fn remove(&self, endpoint: &Endpoint) {
        if let Entry::Occupied(entry) = self.sessions.entry(endpoint.clone()) {
            entry.get().close();
            entry.remove();
        }
        self.record_connections_active();
    }

    pub fn shutdown_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().close();
        }
        self.sessions.clear();
        self.record_connections_active();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_hashable_key() {
        let pool_sessions: DashMap<Endpoint, ()> = DashMap::new();
        pool_sessions.insert(Endpoint::new("a", 1), ());
        assert!(pool_sessions.contains_key(&Endpoint::new("a", 1)));
    }

    #[tokio::test]
    async fn connecting_records_connections_total_and_active() {
        use crate::transport::Transport;
        use crate::websocket::WebSocketTransport;

        let endpoint = Endpoint::new("127.0.0.1", 19311);
        let server = WebSocketTransport::new(8);
        server.listen(endpoint.clone()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let (client_tx, _client_rx) = mpsc::channel(8);
        let client_metrics = Arc::new(MetricsCollector::default());
        let client = ConnectionPool::new_with_metrics(client_tx, 8, client_metrics.clone());
        client.get_or_connect(&endpoint).await.unwrap();

        let flushed = client_metrics.flush();
        assert_eq!(
            flushed.counters[&(names::CONNECTIONS_TOTAL.to_string(), Vec::new())],
            1
        );
        assert_eq!(
            flushed.gauges[&(names::CONNECTIONS_ACTIVE.to_string(), Vec::new())],
            1.0
        );

        client.remove(&endpoint);
        let flushed = client_metrics.flush();
        assert_eq!(
            flushed.gauges[&(names::CONNECTIONS_ACTIVE.to_string(), Vec::new())],
            0.0
        );
    }
}
