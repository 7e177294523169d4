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

use dashmap::DashMap;
use meridian_common::CoreError;
use tokio::sync::oneshot;
use uuid::Uuid;

/// A call id is present from the moment `remoteCall` begins encoding until
/// a response is matched, cancellation fires, or the connection terminates
/// (spec §3 "Pending-call table").
#[derive(Default)]
pub struct PendingCallTable {
    inner: DashMap<Uuid, oneshot::Sender<Result<Vec<u8>, CoreError>>>,
}

impl PendingCallTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, call_id: Uuid) -> oneshot::Receiver<Result<Vec<u8>, CoreError>> {
        let (tx, rx) = oneshot::channel();
        self.inner.insert(call_id, tx);
        rx
    }

    /// Removes the entry without completing it: used both for explicit
    /// cancellation and as the no-op path when a call already completed.
    pub fn cancel(&self, call_id: Uuid) {
        self.inner.remove(&call_id);
    }

    /// Completes the matching sink exactly once. A call id not present is
    /// a late response to an already-cancelled or already-completed call
    /// and is dropped silently (spec §4.1 `completePendingCall`).
    pub fn complete(&self, call_id: Uuid, result: Result<Vec<u8>, CoreError>) -> bool {
        match self.inner.remove(&call_id) {
            Some((_, tx)) => {
                let _ = tx.send(result);
                true
            }
            None => false,
        }
    }

    /// Fails every still-pending call with `err`, used when the underlying
    /// connection terminates (spec §3).
    pub fn fail_all(&self, err: CoreError) {
        let ids: Vec<Uuid> = self.inner.iter().map(|entry| *entry.key()).collect();
        for call_id in ids {
            if let Some((_, tx)) = self.inner.remove(&call_id) {
                let _ = tx.send(Err(err.clone()));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_delivers_exactly_once() {
        let table = PendingCallTable::new();
        let call_id = Uuid::new_v4();
        let rx = table.register(call_id);
        assert!(table.complete(call_id, Ok(vec![1, 2, 3])));
        assert!(!table.complete(call_id, Ok(vec![4]))); // second completion is a no-op
        assert_eq!(rx.await.unwrap().unwrap(), vec![1, 2, 3]);
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn unknown_call_id_completion_is_dropped_silently() {
        let table = PendingCallTable::new();
        assert!(!table.complete(Uuid::new_v4(), Ok(vec![])));
    }

    #[tokio::test]
    async fn cancel_removes_without_completing() {
        let table = PendingCallTable::new();
        let call_id = Uuid::new_v4();
        let rx = table.register(call_id);
        table.cancel(call_id);
        assert!(table.is_empty());
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn fail_all_completes_every_pending_entry() {
        let table = PendingCallTable::new();
        let mut receivers = Vec::new();
        for _ in 0..4 {
            receivers.push(table.register(Uuid::new_v4()));
        }
        table.fail_all(CoreError::ConnectionClosed);
        assert!(table.is_empty());
        for rx in receivers {
            assert_eq!(rx.await.unwrap(), Err(CoreError::ConnectionClosed));
        }
    }
}
