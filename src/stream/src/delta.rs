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

//! Delta encoding (spec §4.2, §9): an optional transform a payload type may
//! opt into. The first value of a stream is sent in full; later values are
//! sent as a delta against the previous one when a nonzero delta exists. A
//! `None` delta suppresses emission entirely.
//!
//! This is orthogonal to sequencing and is the producing application's
//! contract, not the registry's: `current == previous.apply(delta)` must
//! round-trip for whatever concrete type opts in, and that round trip is
//! verified by tests on the concrete type (spec §9 open question), not
//! enforced here.

pub trait DeltaEncodable: Sized + Clone {
    type Delta;

    /// Computes the delta needed to go from `previous` to `self`, or `None`
    /// if nothing changed and emission should be suppressed.
    fn delta(&self, previous: &Self) -> Option<Self::Delta>;

    /// Reconstructs the next value given the previous one and a delta.
    fn apply(previous: &Self, delta: Self::Delta) -> Self;
}

/// Tracks the last full value a producer emitted and reduces each new value
/// to either a full emission (first value) or a delta (subsequent values
/// with a nonzero change), suppressing emission when unchanged.
pub struct DeltaProducer<T: DeltaEncodable> {
    last: Option<T>,
}

pub enum Emission<T: DeltaEncodable> {
    Full(T),
    Delta(T::Delta),
    Suppressed,
}

impl<T: DeltaEncodable> Default for DeltaProducer<T> {
    fn default() -> Self {
        Self { last: None }
    }
}

impl<T: DeltaEncodable> DeltaProducer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, value: T) -> Emission<T> {
        let emission = match &self.last {
            None => Emission::Full(value.clone()),
            Some(previous) => match value.delta(previous) {
                Some(delta) => Emission::Delta(delta),
                None => Emission::Suppressed,
            },
        };
        self.last = Some(value);
        emission
    }
}
