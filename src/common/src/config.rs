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

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reconnection backoff policy (spec §4.5).
///
/// `maxAttempts = 0` disables reconnection. The delay for attempt `n ≥ 1`
/// is `min(maxDelay, initialDelay * backoffMultiplier^(n-1))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReconnectionPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl ReconnectionPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        debug_assert!(attempt >= 1);
        let scaled = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi((attempt - 1) as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1.0,
        }
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Validation size-limit presets (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationLimits {
    pub max_actor_id_len: usize,
    pub max_method_name_len: usize,
    pub max_argument_bytes: usize,
    pub max_total_argument_bytes: usize,
}

impl ValidationLimits {
    pub fn permissive() -> Self {
        Self {
            max_actor_id_len: 4096,
            max_method_name_len: 1024,
            max_argument_bytes: 64 * 1024 * 1024,
            max_total_argument_bytes: 256 * 1024 * 1024,
        }
    }

    pub fn strict() -> Self {
        Self {
            max_actor_id_len: 128,
            max_method_name_len: 128,
            max_argument_bytes: 64 * 1024,
            max_total_argument_bytes: 256 * 1024,
        }
    }
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_actor_id_len: 512,
            max_method_name_len: 256,
            max_argument_bytes: 4 * 1024 * 1024,
            max_total_argument_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Top-level knobs for a Meridian deployment. Loading this from a file or
/// environment is outside the core's scope (spec §1); this struct and its
/// defaults are the contract binaries/tests build on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeridianConfig {
    /// A method whose target identifier begins with this prefix opens a
    /// stream instead of a synchronous call (spec §4.1, default `observe`).
    pub stream_opener_prefix: String,
    /// Default server-side replay ring buffer capacity (spec §4.2).
    pub replay_buffer_capacity: usize,
    /// How long the client waits for a sequence gap to fill before
    /// escalating to a resume (spec §4.2).
    pub gap_fill_timeout: Duration,
    pub reconnection: ReconnectionPolicy,
    /// Bound of the transport's inbound message channel (spec §4.3).
    pub inbound_channel_capacity: usize,
    pub validation_limits: ValidationLimits,
}

impl Default for MeridianConfig {
    fn default() -> Self {
        Self {
            stream_opener_prefix: "observe".to_string(),
            replay_buffer_capacity: 100,
            gap_fill_timeout: Duration::from_secs(5),
            reconnection: ReconnectionPolicy::default(),
            inbound_channel_capacity: 1024,
            validation_limits: ValidationLimits::default(),
        }
    }
}
