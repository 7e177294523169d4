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
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_common::{InvocationEnvelope, MiddlewareContext};
use parking_lot::Mutex;

use crate::error::GatewayError;
use crate::middleware::{Middleware, Next};

/// The outcome of a `checkLimit` call (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at: Instant,
    pub retry_after: Option<Duration>,
}

/// A keyed rate limiter (spec §4.6). `cost` lets a single call account
/// for more than one unit, e.g. a batch invocation.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check_limit(&self, key: &str, cost: u64) -> RateLimitDecision;
    fn reset(&self, key: &str);
}

struct TokenBucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Capacity `C` tokens, refilling at `refill_per_sec` tokens/second,
/// one bucket per key (spec §8 "Testable Properties": token bucket).
pub struct TokenBucketLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: DashMap<String, Mutex<TokenBucketState>>,
}

impl TokenBucketLimiter {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { capacity, refill_per_sec, buckets: DashMap::new() }
    }

    /// Drops buckets that have sat at full capacity since before `idle_after`,
    /// so a limiter serving many short-lived keys doesn't grow unbounded.
    pub fn evict_idle(&self, idle_after: Duration) {
        let now = Instant::now();
        self.buckets.retain(|_, state| {
            let state = state.lock();
            state.tokens < self.capacity || now.duration_since(state.last_refill) < idle_after
        });
    }
}

#[async_trait]
impl RateLimiter for TokenBucketLimiter {
    async fn check_limit(&self, key: &str, cost: u64) -> RateLimitDecision {
        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(TokenBucketState { tokens: self.capacity, last_refill: Instant::now() }));
        let mut state = entry.lock();

        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;

        let cost = cost as f64;
        if state.tokens >= cost {
            state.tokens -= cost;
            RateLimitDecision {
                allowed: true,
                remaining: state.tokens as u64,
                reset_at: now,
                retry_after: None,
            }
        } else {
            let deficit = cost - state.tokens;
            let wait = Duration::from_secs_f64(deficit / self.refill_per_sec);
            RateLimitDecision {
                allowed: false,
                remaining: state.tokens as u64,
                reset_at: now + wait,
                retry_after: Some(wait),
            }
        }
    }

    fn reset(&self, key: &str) {
        self.buckets.remove(key);
    }
}

/// At most `max_requests` timestamped entries in any trailing `window`
/// (spec §8 "Testable Properties": sliding window), one deque per key.
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: u64,
    entries: DashMap<String, Mutex<VecDeque<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self { window, max_requests, entries: DashMap::new() }
    }

    pub fn evict_idle(&self) {
        self.entries.retain(|_, deque| !deque.lock().is_empty());
    }

    fn prune(&self, deque: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = deque.front() {
            if now.duration_since(oldest) >= self.window {
                deque.pop_front();
            } else {
                break;
            }
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindowLimiter {
    async fn check_limit(&self, key: &str, cost: u64) -> RateLimitDecision {
        let entry = self.entries.entry(key.to_string()).or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut deque = entry.lock();
        let now = Instant::now();
        self.prune(&mut deque, now);

        let count = deque.len() as u64;
        if count + cost <= self.max_requests {
            for _ in 0..cost {
                deque.push_back(now);
            }
            RateLimitDecision {
                allowed: true,
                remaining: self.max_requests - (count + cost),
                reset_at: now + self.window,
                retry_after: None,
            }
        } else {
            let retry_after = deque.front().map(|&oldest| self.window.saturating_sub(now.duration_since(oldest)));
            RateLimitDecision {
                allowed: false,
                remaining: self.max_requests.saturating_sub(count),
                reset_at: now + retry_after.unwrap_or(self.window),
                retry_after,
            }
        }
    }

    fn reset(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Applies a [`RateLimiter`] keyed by the authenticated principal's id,
/// or `"anonymous:global"` when none is present (spec §4.6). `cost` is
/// fixed at construction; a caller wanting per-call cost should key its
/// own limiter outside this middleware.
pub struct RateLimitMiddleware {
    limiter: Arc<dyn RateLimiter>,
    cost: u64,
}

impl RateLimitMiddleware {
    pub fn new(limiter: Arc<dyn RateLimiter>) -> Self {
        Self { limiter, cost: 1 }
    }

    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn process(
        &self,
        envelope: InvocationEnvelope,
        context: MiddlewareContext,
        next: Next,
    ) -> Result<Vec<u8>, GatewayError> {
        let key = context
            .principal
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| "anonymous:global".to_string());
        let decision = self.limiter.check_limit(&key, self.cost).await;
        if !decision.allowed {
            return Err(GatewayError::RateLimitExceeded { retry_after: decision.retry_after });
        }
        next.run(envelope, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_bucket_allows_up_to_capacity_then_denies() {
        let limiter = TokenBucketLimiter::new(2.0, 1.0);
        assert!(limiter.check_limit("k", 1).await.allowed);
        assert!(limiter.check_limit("k", 1).await.allowed);
        let denied = limiter.check_limit("k", 1).await;
        assert!(!denied.allowed);
        assert!(denied.retry_after.is_some());
    }

    #[tokio::test]
    async fn token_bucket_refills_over_time() {
        let limiter = TokenBucketLimiter::new(1.0, 1000.0);
        assert!(limiter.check_limit("k", 1).await.allowed);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(limiter.check_limit("k", 1).await.allowed);
    }

    #[tokio::test]
    async fn sliding_window_allows_up_to_max_then_denies_within_window() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 2);
        assert!(limiter.check_limit("k", 1).await.allowed);
        assert!(limiter.check_limit("k", 1).await.allowed);
        assert!(!limiter.check_limit("k", 1).await.allowed);
    }

    #[tokio::test]
    async fn reset_clears_a_keys_state() {
        let limiter = TokenBucketLimiter::new(1.0, 1.0);
        assert!(limiter.check_limit("k", 1).await.allowed);
        assert!(!limiter.check_limit("k", 1).await.allowed);
        limiter.reset("k");
        assert!(limiter.check_limit("k", 1).await.allowed);
    }

    #[tokio::test]
    async fn different_keys_have_independent_buckets() {
        let limiter = TokenBucketLimiter::new(1.0, 1.0);
        assert!(limiter.check_limit("a", 1).await.allowed);
        assert!(limiter.check_limit("b", 1).await.allowed);
    }
}
