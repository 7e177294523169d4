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

//! Identity assignment and invocation dispatch (spec §4.1): the façade
//! generated actor proxies call into for local and remote method
//! dispatch, argument encoding, result decoding, and cancellation.

mod local;
mod pending;
mod proxy;
mod system;

pub use local::{BoxByteStream, LocalActor};
pub use pending::PendingCallTable;
pub use proxy::ResolvedActor;
pub use system::ActorSystem;
