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

//! Shared data model and error taxonomy for the Meridian distributed
//! actor runtime. Every other crate in the workspace depends on this one;
//! it has no dependency on transport, stream or gateway concerns.

pub mod config;
pub mod envelope;
pub mod error;
pub mod ids;
pub mod principal;
pub mod telemetry;

pub use config::{MeridianConfig, ReconnectionPolicy, ValidationLimits};
pub use envelope::{
    InvocationEnvelope, ResponseEnvelope, StreamDataEnvelope, StreamEndEnvelope,
    StreamErrorEnvelope, StreamFilterDescriptor, StreamResumeEnvelope, StreamStartEnvelope,
    TerminationReason, TraceContext, TransportEnvelope,
};
pub use error::CoreError;
pub use ids::{ActorId, Endpoint};
pub use principal::{MiddlewareContext, Principal, PrincipalType};
