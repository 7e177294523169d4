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

/// The server-side stream table's view of "the session this stream is
/// currently attached to". Deliberately narrow so this crate never depends
/// on a concrete transport: `meridian_server` adapts its transport respond
/// side-channel to this trait.
#[async_trait]
pub trait StreamSink: Send + Sync {
    async fn send(&self, envelope: TransportEnvelope) -> Result<(), CoreError>;
}
