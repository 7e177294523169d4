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

use async_trait::async_trait;
use meridian_common::{CoreError, TransportEnvelope};
use meridian_transport::RespondHandle;
use meridian_stream::StreamSink;

/// Adapts a transport session's respond side-channel to the stream
/// registry's narrow sink trait, so `meridian_stream` never depends on a
/// concrete transport.
pub struct RespondSink(pub RespondHandle);

#[async_trait]
impl StreamSink for RespondSink {
    async fn send(&self, envelope: TransportEnvelope) -> Result<(), CoreError> {
        let bytes = serde_json::to_vec(&envelope).map_err(CoreError::serialization)?;
        self.0.respond(bytes).await.map_err(CoreError::from)
    }
}
