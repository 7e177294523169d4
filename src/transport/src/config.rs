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

/// TLS material for the WebSocket server side: a PEM certificate chain
/// plus a PEM private key. The server negotiates a minimum of TLS 1.2
/// (spec §4.3).
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub cert_chain_pem: Vec<u8>,
    pub private_key_pem: Vec<u8>,
}

/// `{webSocket(host, port, tls?) | tcp(host, port)}` (spec §6). TCP is
/// reserved: the core's transport implementation only binds the
/// WebSocket variant.
#[derive(Debug, Clone)]
pub enum TransportConfiguration {
    WebSocket {
        host: String,
        port: u16,
        tls: Option<TlsMaterial>,
    },
    Tcp {
        host: String,
        port: u16,
    },
}

impl TransportConfiguration {
    pub fn host(&self) -> &str {
        match self {
            TransportConfiguration::WebSocket { host, .. } => host,
            TransportConfiguration::Tcp { host, .. } => host,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            TransportConfiguration::WebSocket { port, .. } => *port,
            TransportConfiguration::Tcp { port, .. } => *port,
        }
    }
}
