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
use std::time::Instant;

use meridian_actor::ActorSystem;
use meridian_common::{InvocationEnvelope, MiddlewareContext, ResponseEnvelope};
use meridian_metrics::{names, tags, Collector, Tags};
use tracing::warn;

use crate::error::GatewayError;
use crate::middleware::{Middleware, Next};

/// The untrusted-inbound entry point layered in front of actor dispatch
/// (spec §4.6): runs every invocation through a fixed, outermost-first
/// middleware chain before (and only if every link passes) delegating
/// to the actor system, and shapes the outcome into a
/// [`ResponseEnvelope`] with `invocations.*` metrics recorded around it.
///
/// Only non-streaming invocations are dispatched here; a stream opener
/// reaching the terminal step is rejected as a validation error — the
/// streaming path (spec §4.2) is server dispatch's responsibility
/// (`meridian_server::Server`), which this gateway can sit in front of
/// as a transport-level proxy but does not reimplement.
pub struct Gateway {
    actor_system: Arc<ActorSystem>,
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
    metrics: Arc<dyn Collector>,
}

impl Gateway {
    pub fn new(actor_system: Arc<ActorSystem>, metrics: Arc<dyn Collector>, middlewares: Vec<Arc<dyn Middleware>>) -> Arc<Self> {
        Arc::new(Self { actor_system, middlewares: Arc::new(middlewares), metrics })
    }

    /// `context` carries whatever the transport layer has already
    /// extracted (at minimum the raw credentials string, via
    /// `context.metadata`) before the chain's authentication middleware
    /// runs — the gateway itself never touches the wire.
    pub async fn dispatch(self: &Arc<Self>, envelope: InvocationEnvelope, context: MiddlewareContext) -> ResponseEnvelope {
        let call_id = envelope.call_id;
        let this = self.clone();
        let next = Next::new(
            self.middlewares.clone(),
            Arc::new(move |envelope, _context| {
                let this = this.clone();
                Box::pin(async move { this.terminal_dispatch(envelope).await })
            }),
        );

        let started = Instant::now();
        let result = next.run(envelope, context).await;
        self.metrics.record_histogram(names::INVOCATIONS_LATENCY, &Tags::new(), started.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(bytes) => {
                self.metrics.increment_counter(names::INVOCATIONS_COUNT, &tags([("status", "success".to_string())]), 1);
                ResponseEnvelope::Success { call_id, result: bytes }
            }
            Err(err) => {
                self.metrics.increment_counter(names::INVOCATIONS_COUNT, &tags([("status", "failure".to_string())]), 1);
                self.metrics
                    .increment_counter(names::INVOCATIONS_ERRORS, &tags([("reason", err.reason_tag().to_string())]), 1);
                warn!(reason = err.reason_tag(), error = %err, "gateway rejected invocation");
                ResponseEnvelope::Failure { call_id, error: err.response_message() }
            }
        }
    }

    async fn terminal_dispatch(&self, envelope: InvocationEnvelope) -> Result<Vec<u8>, GatewayError> {
        if self.actor_system.is_stream_opener(&envelope.target) {
            return Err(GatewayError::Validation(
                "gateway does not dispatch stream openers; route through server dispatch".into(),
            ));
        }
        let local_actor = self
            .actor_system
            .local_actor(&envelope.actor)
            .ok_or_else(|| GatewayError::ActorNotFound(envelope.actor.to_string()))?;
        self.actor_system
            .execute_target(&envelope, local_actor.as_ref())
            .await
            .map_err(|err| GatewayError::Handler(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthenticationMiddleware, InMemoryAuthenticationProvider};
    use crate::authz::{AuthorizationMiddleware, RoleBasedAuthorizationPolicy};
    use crate::rate_limit::{RateLimitMiddleware, TokenBucketLimiter};
    use crate::validation::ValidationMiddleware;
    use async_trait::async_trait;
    use meridian_actor::{BoxByteStream, LocalActor};
    use meridian_common::{ActorId, CoreError, MeridianConfig, Principal, PrincipalType, ValidationLimits};
    use meridian_metrics::MetricsCollector;
    use meridian_transport::WebSocketTransport;
    use uuid::Uuid;

    struct Greeter(ActorId);

    #[async_trait]
    impl LocalActor for Greeter {
        fn id(&self) -> &ActorId {
            &self.0
        }

        async fn invoke(&self, _target: &str, args: Vec<Vec<u8>>) -> Result<Vec<u8>, CoreError> {
            Ok(args.into_iter().next().unwrap_or_default())
        }

        fn invoke_stream(&self, _target: &str, _args: Vec<Vec<u8>>) -> BoxByteStream {
            unimplemented!("not exercised by these tests")
        }
    }

    fn envelope(actor: &ActorId, args: Vec<Vec<u8>>, metadata_credentials: Option<&str>) -> (InvocationEnvelope, MiddlewareContext) {
        let envelope = InvocationEnvelope {
            call_id: Uuid::new_v4(),
            actor: actor.clone(),
            target: "greet".into(),
            args,
            generics: vec![],
            trace_context: None,
            stream_filter: None,
        };
        let mut context = MiddlewareContext::new();
        if let Some(creds) = metadata_credentials {
            context.metadata.insert("credentials".into(), creds.to_string());
        }
        (envelope, context)
    }

    #[tokio::test]
    async fn happy_path_runs_the_full_chain_and_reaches_the_handler() {
        let actor_system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let actor_id = ActorId::local("room-1");
        actor_system.register_local(Arc::new(Greeter(actor_id.clone())));

        let auth_provider = Arc::new(
            InMemoryAuthenticationProvider::new()
                .with_bearer_token("tok-1", Principal::new("u1", PrincipalType::User).with_roles(["member"])),
        );
        let authz_policy = Arc::new(RoleBasedAuthorizationPolicy::new().allow("room.greet", ["member"]));
        let limiter = Arc::new(TokenBucketLimiter::new(10.0, 1.0));

        let middlewares: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(AuthenticationMiddleware::new(auth_provider)),
            Arc::new(AuthorizationMiddleware::new(authz_policy)),
            Arc::new(RateLimitMiddleware::new(limiter)),
            Arc::new(ValidationMiddleware::new(ValidationLimits::default())),
        ];
        let gateway = Gateway::new(actor_system, Arc::new(MetricsCollector::default()), middlewares);

        let (envelope, context) = envelope(&actor_id, vec![b"hello".to_vec()], Some("bearer:tok-1"));
        let response = gateway.dispatch(envelope, context).await;
        match response {
            ResponseEnvelope::Success { result, .. } => assert_eq!(result, b"hello".to_vec()),
            ResponseEnvelope::Failure { error, .. } => panic!("expected success, got {error}"),
        }
    }

    #[tokio::test]
    async fn missing_credentials_is_rejected_before_the_handler_runs() {
        let actor_system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let actor_id = ActorId::local("room-1");
        actor_system.register_local(Arc::new(Greeter(actor_id.clone())));

        let middlewares: Vec<Arc<dyn Middleware>> =
            vec![Arc::new(AuthenticationMiddleware::new(Arc::new(InMemoryAuthenticationProvider::new())))];
        let gateway = Gateway::new(actor_system, Arc::new(MetricsCollector::default()), middlewares);

        let (envelope, context) = envelope(&actor_id, vec![], None);
        let response = gateway.dispatch(envelope, context).await;
        match response {
            ResponseEnvelope::Failure { error, .. } => assert!(error.starts_with("Authentication failed")),
            ResponseEnvelope::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn unknown_actor_is_reported_as_actor_not_found() {
        let actor_system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let gateway = Gateway::new(actor_system, Arc::new(MetricsCollector::default()), vec![]);

        let (envelope, context) = envelope(&ActorId::local("ghost"), vec![], None);
        let response = gateway.dispatch(envelope, context).await;
        match response {
            ResponseEnvelope::Failure { error, .. } => assert!(error.starts_with("Actor not found")),
            ResponseEnvelope::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn stream_openers_are_rejected_by_the_terminal_step() {
        let actor_system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let actor_id = ActorId::local("room-1");
        actor_system.register_local(Arc::new(Greeter(actor_id.clone())));
        let gateway = Gateway::new(actor_system, Arc::new(MetricsCollector::default()), vec![]);

        let (mut envelope, context) = envelope(&actor_id, vec![], None);
        envelope.target = "observeState".into();
        let response = gateway.dispatch(envelope, context).await;
        match response {
            ResponseEnvelope::Failure { error, .. } => assert!(error.starts_with("Validation failed")),
            ResponseEnvelope::Success { .. } => panic!("expected failure"),
        }
    }
}
