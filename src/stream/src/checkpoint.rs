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

use meridian_common::{ActorId, StreamResumeEnvelope};
use uuid::Uuid;

/// A client-side record of the highest stream sequence safely processed,
/// used to resume after a reconnect (spec §4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub stream_id: Uuid,
    pub last_sequence: u64,
    pub method: String,
    pub actor: ActorId,
}

impl Checkpoint {
    pub fn to_resume_envelope(&self) -> StreamResumeEnvelope {
        StreamResumeEnvelope {
            stream_id: self.stream_id,
            last_sequence: self.last_sequence,
        }
    }
}
