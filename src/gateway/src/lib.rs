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

//! The gateway and its middleware chain (spec §4.6): authentication,
//! authorization, rate limiting, validation and tracing, composed
//! outermost-first in front of actor dispatch.

mod auth;
mod authz;
mod error;
mod gateway;
mod middleware;
mod rate_limit;
mod tracing_mw;
mod validation;

pub use auth::{AuthenticationMiddleware, AuthenticationProvider, Credentials, InMemoryAuthenticationProvider};
pub use authz::{Action, AuthorizationMiddleware, AuthorizationPolicy, Resource, RoleBasedAuthorizationPolicy};
pub use error::GatewayError;
pub use gateway::Gateway;
pub use middleware::{Middleware, Next};
pub use rate_limit::{RateLimitDecision, RateLimitMiddleware, RateLimiter, SlidingWindowLimiter, TokenBucketLimiter};
pub use tracing_mw::{LoggingTraceExporter, TraceExporter, TraceRecord, TracingMiddleware};
pub use validation::ValidationMiddleware;
