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

//! Stable standard metric names (spec §4.7).

pub const INVOCATIONS_COUNT: &str = "invocations.count";
pub const INVOCATIONS_LATENCY: &str = "invocations.latency";
pub const INVOCATIONS_ERRORS: &str = "invocations.errors";
pub const CONNECTIONS_ACTIVE: &str = "connections.active";
pub const CONNECTIONS_TOTAL: &str = "connections.total";
pub const STATE_OPERATIONS_COUNT: &str = "state.operations.count";
pub const STATE_OPERATIONS_LATENCY: &str = "state.operations.latency";
pub const ACTORS_ACTIVE: &str = "actors.active";
