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

use std::sync::Arc;

use meridian_common::ActorId;

use crate::local::LocalActor;

/// What `ActorSystem::resolve` hands back: a local handle, or a remote
/// proxy bound to the endpoint encoded in the id (spec §4.1).
pub enum ResolvedActor {
    Local(Arc<dyn LocalActor>),
    Remote(ActorId),
}

impl ResolvedActor {
    pub fn is_local(&self) -> bool {
        matches!(self, ResolvedActor::Local(_))
    }
}
