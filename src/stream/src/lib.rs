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

//! The bidirectional, sequenced, resumable stream multiplexer (spec §4.2):
//! a server-side replay buffer and resume protocol, a client-side table
//! with gap detection, dedup, and in-order delivery, stream filters, and
//! the optional delta-encoding transform.

mod checkpoint;
mod client;
mod delta;
mod filter;
mod replay;
mod server;
mod sink;

pub use checkpoint::Checkpoint;
pub use client::{await_stream_open, ClientStreamTable, StreamConsumer, StreamItem};
pub use delta::{DeltaEncodable, DeltaProducer, Emission};
pub use filter::{FilterRegistry, StreamFilter};
pub use replay::ReplayBuffer;
pub use server::{ResumeOutcome, ServerStreamTable};
pub use sink::StreamSink;
