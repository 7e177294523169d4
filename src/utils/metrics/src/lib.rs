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

//! Observability primitives (spec §4.7): counters, gauges and
//! reservoir-sampled histograms, all keyed by `(name, tag-map)` with the
//! tag map hashed by its sorted keys.

mod collector;
mod histogram;
pub mod names;

pub use collector::{Collector, MetricsCollector};
pub use histogram::{Histogram, HistogramSnapshot};

use std::collections::BTreeMap;

/// A tag map, sorted by key so two maps with the same entries in a
/// different insertion order hash identically.
pub type Tags = BTreeMap<String, String>;

pub fn tags(pairs: impl IntoIterator<Item = (&'static str, String)>) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
