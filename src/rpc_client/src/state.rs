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

/// The client dispatch connection state machine (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting(u32),
    Failed(String),
}

impl ConnectionState {
    pub fn can_connect(&self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed(_))
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Reconnecting(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_connect_only_from_disconnected_or_failed() {
        assert!(ConnectionState::Disconnected.can_connect());
        assert!(ConnectionState::Failed("x".into()).can_connect());
        assert!(!ConnectionState::Connecting.can_connect());
        assert!(!ConnectionState::Connected.can_connect());
        assert!(!ConnectionState::Reconnecting(1).can_connect());
    }

    #[test]
    fn is_transitioning_only_during_connecting_or_reconnecting() {
        assert!(ConnectionState::Connecting.is_transitioning());
        assert!(ConnectionState::Reconnecting(3).is_transitioning());
        assert!(!ConnectionState::Connected.is_transitioning());
        assert!(!ConnectionState::Disconnected.is_transitioning());
    }
}
