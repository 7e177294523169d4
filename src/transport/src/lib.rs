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

//! Message-framed connection manager (spec §4.3): the secure-WebSocket
//! transport, its outbound connection pool, and the single inbound
//! message stream consumed by server/client dispatch.

mod config;
mod error;
mod message;
mod pool;
mod session;
mod transport;
mod websocket;

pub use config::{TlsMaterial, TransportConfiguration};
pub use error::{TransportError, TransportResult};
pub use message::{RespondHandle, TransportMessage};
pub use pool::ConnectionPool;
pub use transport::{IncomingMessages, Transport};
pub use websocket::WebSocketTransport;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use meridian_common::Endpoint;
    use std::time::Duration;

    #[tokio::test]
    async fn loopback_send_is_observed_on_incoming() {
        let server = WebSocketTransport::new(64);
        let endpoint = Endpoint::new("127.0.0.1", 18731);
        server.listen(endpoint.clone()).await.unwrap();
        // Give the accept loop a tick to bind before the client dials.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let client = WebSocketTransport::new(64);
        client
            .send(b"hello".to_vec(), endpoint.clone())
            .await
            .unwrap();

        let mut incoming = server.incoming();
        let message = tokio::time::timeout(Duration::from_secs(2), incoming.next())
            .await
            .expect("timed out waiting for inbound message")
            .expect("incoming stream ended");
        assert_eq!(message.bytes, b"hello");

        server.shutdown().await.unwrap();
        client.shutdown().await.unwrap();
    }

    #[test]
    #[should_panic(expected = "one consumer")]
    fn incoming_panics_on_second_call() {
        let transport = WebSocketTransport::new(4);
        let _first = transport.incoming();
        let _second = transport.incoming();
    }
}
