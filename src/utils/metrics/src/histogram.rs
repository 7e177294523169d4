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

use rand::Rng;

/// A histogram backed by reservoir sampling (algorithm R) with a bounded
/// sample count, so an unbounded stream of `record` calls never grows
/// memory past `capacity` samples (spec §4.7, default 1000).
#[derive(Debug, Clone)]
pub struct Histogram {
    capacity: usize,
    samples: Vec<f64>,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl Histogram {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: Vec::new(),
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            // Classic reservoir sampling: replace a uniformly random
            // existing sample with probability capacity/count.
            let idx = rand::thread_rng().gen_range(0..self.count as usize);
            if idx < self.capacity {
                self.samples[idx] = value;
            }
        }
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        if self.count == 0 {
            return HistogramSnapshot {
                count: 0,
                sum: 0.0,
                mean: 0.0,
                min: 0.0,
                max: 0.0,
                p50: 0.0,
                p95: 0.0,
                p99: 0.0,
            };
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        HistogramSnapshot {
            count: self.count,
            sum: self.sum,
            mean: self.sum / self.count as f64,
            min: self.min,
            max: self.max,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_count_sum_min_max_beyond_capacity() {
        let mut h = Histogram::new(4);
        for v in 1..=100 {
            h.record(v as f64);
        }
        let snap = h.snapshot();
        assert_eq!(snap.count, 100);
        assert_eq!(snap.sum, (1..=100).sum::<i32>() as f64);
        assert_eq!(snap.min, 1.0);
        assert_eq!(snap.max, 100.0);
        assert_eq!(snap.mean, snap.sum / 100.0);
    }

    #[test]
    fn percentiles_on_uniform_distribution() {
        let mut h = Histogram::new(1000);
        for v in 1..=1000 {
            h.record(v as f64);
        }
        let snap = h.snapshot();
        assert!((snap.p50 - 500.0).abs() < 5.0);
        assert!((snap.p95 - 950.0).abs() < 5.0);
        assert!((snap.p99 - 990.0).abs() < 5.0);
    }

    #[test]
    fn empty_histogram_reports_zeroes() {
        let h = Histogram::new(10);
        let snap = h.snapshot();
        assert_eq!(snap.count, 0);
        assert_eq!(snap.p99, 0.0);
    }
}
