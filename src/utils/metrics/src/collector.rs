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

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::histogram::{Histogram, HistogramSnapshot};
use crate::Tags;

/// The collector contract (spec §4.7): safe for concurrent
/// increment/record from many contexts.
pub trait Collector: Send + Sync {
    fn increment_counter(&self, name: &str, tags: &Tags, delta: u64);
    fn record_gauge(&self, name: &str, tags: &Tags, value: f64);
    fn record_histogram(&self, name: &str, tags: &Tags, value: f64);
    fn flush(&self) -> FlushedMetrics;
}

#[derive(Debug, Clone, Default)]
pub struct FlushedMetrics {
    pub counters: HashMap<(String, Vec<(String, String)>), u64>,
    pub gauges: HashMap<(String, Vec<(String, String)>), f64>,
    pub histograms: HashMap<(String, Vec<(String, String)>), HistogramSnapshot>,
}

type SeriesKey = Vec<(String, String)>;

fn series_key(tags: &Tags) -> SeriesKey {
    tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

struct PerMetric<V> {
    /// Insertion order of series keys, used to evict the oldest once
    /// `max_series_per_metric` is exceeded (bounded-cardinality guard,
    /// SPEC_FULL §B).
    order: VecDeque<SeriesKey>,
    series: HashMap<SeriesKey, V>,
}

impl<V> PerMetric<V> {
    fn new() -> Self {
        Self {
            order: VecDeque::new(),
            series: HashMap::new(),
        }
    }

    fn entry(&mut self, key: SeriesKey, max_series: usize, default: impl FnOnce() -> V) -> &mut V {
        if !self.series.contains_key(&key) {
            if self.order.len() >= max_series {
                if let Some(oldest) = self.order.pop_front() {
                    self.series.remove(&oldest);
                }
            }
            self.order.push_back(key.clone());
            self.series.insert(key.clone(), default());
        }
        self.series.get_mut(&key).unwrap()
    }
}

/// Default in-process collector. One `Mutex`-guarded map per metric kind,
/// mirroring the single-writer-per-resource discipline used throughout
/// this workspace rather than lock-free structures.
pub struct MetricsCollector {
    histogram_capacity: usize,
    max_series_per_metric: usize,
    counters: Mutex<HashMap<String, PerMetric<u64>>>,
    gauges: Mutex<HashMap<String, PerMetric<f64>>>,
    histograms: Mutex<HashMap<String, PerMetric<Histogram>>>,
}

impl MetricsCollector {
    pub fn new(histogram_capacity: usize, max_series_per_metric: usize) -> Self {
        Self {
            histogram_capacity,
            max_series_per_metric,
            counters: Mutex::new(HashMap::new()),
            gauges: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(1000, 10_000)
    }
}

impl Collector for MetricsCollector {
    fn increment_counter(&self, name: &str, tags: &Tags, delta: u64) {
        let mut counters = self.counters.lock();
        let per_metric = counters.entry(name.to_string()).or_insert_with(PerMetric::new);
        let slot = per_metric.entry(series_key(tags), self.max_series_per_metric, || 0);
        *slot += delta;
    }

    fn record_gauge(&self, name: &str, tags: &Tags, value: f64) {
        let mut gauges = self.gauges.lock();
        let per_metric = gauges.entry(name.to_string()).or_insert_with(PerMetric::new);
        let slot = per_metric.entry(series_key(tags), self.max_series_per_metric, || 0.0);
        *slot = value;
    }

    fn record_histogram(&self, name: &str, tags: &Tags, value: f64) {
        let mut histograms = self.histograms.lock();
        let capacity = self.histogram_capacity;
        let per_metric = histograms.entry(name.to_string()).or_insert_with(PerMetric::new);
        let slot = per_metric.entry(series_key(tags), self.max_series_per_metric, || {
            Histogram::new(capacity)
        });
        slot.record(value);
    }

    fn flush(&self) -> FlushedMetrics {
        let mut out = FlushedMetrics::default();
        for (name, per_metric) in self.counters.lock().iter() {
            for (key, value) in per_metric.series.iter() {
                out.counters.insert((name.clone(), key.clone()), *value);
            }
        }
        for (name, per_metric) in self.gauges.lock().iter() {
            for (key, value) in per_metric.series.iter() {
                out.gauges.insert((name.clone(), key.clone()), *value);
            }
        }
        for (name, per_metric) in self.histograms.lock().iter() {
            for (key, value) in per_metric.series.iter() {
                out.histograms
                    .insert((name.clone(), key.clone()), value.snapshot());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags;

    #[test]
    fn counter_accumulates_per_series() {
        let collector = MetricsCollector::default();
        let t1 = tags([("actor", "room".to_string())]);
        let t2 = tags([("actor", "lobby".to_string())]);
        collector.increment_counter("invocations.count", &t1, 1);
        collector.increment_counter("invocations.count", &t1, 2);
        collector.increment_counter("invocations.count", &t2, 5);

        let flushed = collector.flush();
        assert_eq!(
            flushed.counters[&("invocations.count".to_string(), series_key(&t1))],
            3
        );
        assert_eq!(
            flushed.counters[&("invocations.count".to_string(), series_key(&t2))],
            5
        );
    }

    #[test]
    fn bounded_cardinality_evicts_oldest_series() {
        let collector = MetricsCollector::new(1000, 2);
        for i in 0..5 {
            let t = tags([("key", i.to_string())]);
            collector.increment_counter("m", &t, 1);
        }
        let flushed = collector.flush();
        let series_for_m: Vec<_> = flushed
            .counters
            .keys()
            .filter(|(name, _)| name == "m")
            .collect();
        assert_eq!(series_for_m.len(), 2);
    }

    #[test]
    fn gauge_overwrites() {
        let collector = MetricsCollector::default();
        let t = Tags::new();
        collector.record_gauge("connections.active", &t, 3.0);
        collector.record_gauge("connections.active", &t, 7.0);
        let flushed = collector.flush();
        assert_eq!(
            flushed.gauges[&("connections.active".to_string(), series_key(&t))],
            7.0
        );
    }
}
