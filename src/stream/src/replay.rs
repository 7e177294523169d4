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

use std::collections::VecDeque;

/// Bounded ring of recent `(sequence, payload)` pairs kept per server-side
/// stream (spec §3, §4.2). FIFO eviction once `capacity` is exceeded.
pub struct ReplayBuffer {
    capacity: usize,
    entries: VecDeque<(u64, Vec<u8>)>,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push(&mut self, sequence: u64, payload: Vec<u8>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((sequence, payload));
    }

    /// The oldest sequence still buffered, or `None` if nothing has been
    /// pushed yet (distinct from "evicted past a checkpoint").
    pub fn front_sequence(&self) -> Option<u64> {
        self.entries.front().map(|(seq, _)| *seq)
    }

    /// Every buffered entry with `sequence > last_seq`, in order. Callers
    /// must first confirm via [`Self::front_sequence`] that the buffer has
    /// not evicted past `last_seq`.
    pub fn entries_after(&self, last_seq: u64) -> Vec<(u64, Vec<u8>)> {
        self.entries
            .iter()
            .filter(|(seq, _)| *seq > last_seq)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut buf = ReplayBuffer::new(3);
        for seq in 1..=5 {
            buf.push(seq, vec![seq as u8]);
        }
        assert_eq!(buf.front_sequence(), Some(3));
        assert_eq!(
            buf.entries_after(0).iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }

    #[test]
    fn entries_after_excludes_seen() {
        let mut buf = ReplayBuffer::new(10);
        for seq in 1..=10 {
            buf.push(seq, vec![seq as u8]);
        }
        let missing = buf.entries_after(4);
        assert_eq!(
            missing.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            vec![5, 6, 7, 8, 9, 10]
        );
    }
}
