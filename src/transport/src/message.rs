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

use meridian_common::Endpoint;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::error::{TransportError, TransportResult};

/// The originating session's write side. `respond` targets the session a
/// message arrived on, never a freshly dialed one (spec §4.3).
#[derive(Clone)]
pub struct RespondHandle {
    outbound: mpsc::Sender<WsMessage>,
}

impl RespondHandle {
    pub(crate) fn new(outbound: mpsc::Sender<WsMessage>) -> Self {
        Self { outbound }
    }

    pub async fn respond(&self, data: Vec<u8>) -> TransportResult<()> {
        self.outbound
            .send(WsMessage::Binary(data))
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    pub(crate) fn raw_sender(&self) -> &mpsc::Sender<WsMessage> {
        &self.outbound
    }
}

/// One inbound message plus the means to answer it on the same session.
pub struct TransportMessage {
    pub bytes: Vec<u8>,
    pub source: Option<Endpoint>,
    pub respond: RespondHandle,
}
