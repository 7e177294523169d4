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

//! Inbound dispatch (spec §4.4): envelope decoding and routing, the
//! exposed-actor registry, and dynamic actor exposure.

mod dispatch;
mod registry;
mod sink;

pub use dispatch::{OnActorRequest, Server};
pub use registry::ExposedActorRegistry;
pub use sink::RespondSink;
