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

//! Process-wide logging init, kept out of library crates on purpose: a
//! library that installs a global subscriber behind its caller's back is
//! a bad citizen. Binaries and integration tests call [`init`] once.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` formatter driven by `RUST_LOG`,
/// defaulting to `info` when unset. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
