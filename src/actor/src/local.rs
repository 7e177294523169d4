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
use futures::stream::BoxStream;
use meridian_common::{ActorId, CoreError};

/// A lazy sequence of stream payloads produced by a streaming method, not
/// yet sequenced or buffered: `meridian_server` drives this into its
/// `ServerStreamTable` (spec §4.1 `executeStreamingTarget`).
pub type BoxByteStream = BoxStream<'static, Result<Vec<u8>, CoreError>>;

/// The application runtime's side of the dispatch boundary (spec §4.1):
/// the core only specifies this interface, not how a method table is
/// built or how generated code fills it.
#[async_trait]
pub trait LocalActor: Send + Sync {
    fn id(&self) -> &ActorId;

    /// Invokes `target` with per-argument encoded bytes and returns the
    /// encoded result, or a `remoteInvocationFailed`-worthy error.
    async fn invoke(&self, target: &str, args: Vec<Vec<u8>>) -> Result<Vec<u8>, CoreError>;

    /// Invokes a stream-opener method, returning the lazy byte sequence it
    /// produces. Only called when the target identifier carries the
    /// configured stream-opener prefix.
    fn invoke_stream(&self, target: &str, args: Vec<Vec<u8>>) -> BoxByteStream;
}
