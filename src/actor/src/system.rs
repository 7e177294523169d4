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

use dashmap::DashMap;
use meridian_common::{
    ActorId, CoreError, InvocationEnvelope, MeridianConfig, ResponseEnvelope, StreamDataEnvelope,
    StreamEndEnvelope, StreamErrorEnvelope, StreamFilterDescriptor, StreamStartEnvelope,
    TraceContext, TransportEnvelope,
};
use meridian_metrics::{names, Collector, MetricsCollector, Tags};
use meridian_stream::{await_stream_open, ClientStreamTable, StreamConsumer};
use meridian_transport::Transport;
use tracing::debug;
use uuid::Uuid;

use crate::local::{BoxByteStream, LocalActor};
use crate::pending::PendingCallTable;
use crate::proxy::ResolvedActor;

/// Per-call sink capacity for a `remoteCallStream` consumer. Bounded so a
/// slow consumer applies back pressure to stream delivery rather than
/// buffering without limit.
const STREAM_CONSUMER_CAPACITY: usize = 256;

/// Identity assignment and invocation dispatch (spec §4.1): the façade
/// application code and generated proxies call into for both local and
/// remote method dispatch. Owns the pending-call table and the
/// client-side stream table exclusively (spec §3).
pub struct ActorSystem {
    config: MeridianConfig,
    transport: Arc<dyn Transport>,
    local_actors: DashMap<ActorId, Arc<dyn LocalActor>>,
    pending_calls: PendingCallTable,
    client_streams: ClientStreamTable,
    metrics: Arc<dyn Collector>,
}

impl ActorSystem {
    pub fn new(config: MeridianConfig, transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::new_with_metrics(config, transport, Arc::new(MetricsCollector::default()))
    }

    /// Same as [`Self::new`], but records `actors.active` (spec §4.7) to
    /// the given collector instead of a private, unshared default.
    pub fn new_with_metrics(
        config: MeridianConfig,
        transport: Arc<dyn Transport>,
        metrics: Arc<dyn Collector>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            transport,
            local_actors: DashMap::new(),
            pending_calls: PendingCallTable::new(),
            client_streams: ClientStreamTable::new(),
            metrics,
        })
    }

    pub fn config(&self) -> &MeridianConfig {
        &self.config
    }

    /// A target identifier is a stream opener iff it begins with the
    /// configured prefix (spec §4.1, default `"observe"`).
    pub fn is_stream_opener(&self, target: &str) -> bool {
        target.starts_with(&self.config.stream_opener_prefix)
    }

    /// Generates a fresh, unique local actor id. No blocking (spec §4.1).
    pub fn assign_id(&self, actor_type: &str) -> ActorId {
        ActorId::local(format!("{actor_type}-{}", Uuid::new_v4()))
    }

    pub fn register_local(&self, actor: Arc<dyn LocalActor>) {
        self.local_actors.insert(actor.id().clone(), actor);
        self.record_actors_active();
    }

    pub fn unregister_local(&self, id: &ActorId) -> Option<Arc<dyn LocalActor>> {
        let removed = self.local_actors.remove(id).map(|(_, actor)| actor);
        self.record_actors_active();
        removed
    }

    fn record_actors_active(&self) {
        self.metrics
            .record_gauge(names::ACTORS_ACTIVE, &Tags::new(), self.local_actors.len() as f64);
    }

    pub fn local_actor(&self, id: &ActorId) -> Option<Arc<dyn LocalActor>> {
        self.local_actors.get(id).map(|entry| entry.clone())
    }

    /// Returns a local handle if `id` is locally registered; otherwise a
    /// remote proxy bound to the endpoint encoded in `id`. Fails with
    /// `actorNotFound` only when `id` is local and unregistered, i.e.
    /// neither resolvable here nor dispatchable remotely (spec §4.1).
    pub fn resolve(&self, id: &ActorId) -> Result<ResolvedActor, CoreError> {
        if let Some(actor) = self.local_actors.get(id) {
            return Ok(ResolvedActor::Local(actor.clone()));
        }
        match &id.endpoint {
            Some(_) => Ok(ResolvedActor::Remote(id.clone())),
            None => Err(CoreError::ActorNotFound(id.to_string())),
        }
    }

    /// Encodes and sends an `InvocationEnvelope`, suspends until the
    /// response is matched, and decodes the result. Unregisters the
    /// pending sink on every termination path, including cancellation of
    /// the awaiting future (spec §4.1).
    pub async fn remote_call(
        &self,
        actor: &ActorId,
        target: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<Vec<u8>, CoreError> {
        let endpoint = actor.endpoint.clone().ok_or_else(|| {
            CoreError::InvalidConfiguration(format!("remoteCall requires a remote actor id, got {actor}"))
        })?;
        let call_id = Uuid::new_v4();
        let rx = self.pending_calls.register(call_id);
        let _guard = CancelOnDrop {
            table: &self.pending_calls,
            call_id,
        };

        let envelope = TransportEnvelope::Invocation(InvocationEnvelope {
            call_id,
            actor: actor.clone(),
            target: target.to_string(),
            args,
            generics: Vec::new(),
            trace_context: None,
            stream_filter: None,
        });
        let bytes = serde_json::to_vec(&envelope).map_err(CoreError::serialization)?;
        self.transport
            .send(bytes, endpoint)
            .await
            .map_err(CoreError::from)?;

        rx.await.map_err(|_| CoreError::ConnectionClosed)?
    }

    /// Same dispatch as [`Self::remote_call`] but opens a stream: the
    /// invocation is a stream opener, and the returned consumer yields
    /// payloads as they arrive, deduplicated and in order (spec §4.1).
    pub async fn remote_call_stream(
        &self,
        actor: &ActorId,
        target: &str,
        args: Vec<Vec<u8>>,
    ) -> Result<StreamConsumer, CoreError> {
        let endpoint = actor.endpoint.clone().ok_or_else(|| {
            CoreError::InvalidConfiguration(format!(
                "remoteCallStream requires a remote actor id, got {actor}"
            ))
        })?;
        let call_id = Uuid::new_v4();
        let (id_rx, item_rx) = self
            .client_streams
            .register_open(call_id, STREAM_CONSUMER_CAPACITY);

        let envelope = TransportEnvelope::Invocation(InvocationEnvelope {
            call_id,
            actor: actor.clone(),
            target: target.to_string(),
            args,
            generics: Vec::new(),
            trace_context: Some(TraceContext {
                trace_id: Uuid::new_v4(),
                span_id: Uuid::new_v4(),
            }),
            stream_filter: None,
        });
        let bytes = serde_json::to_vec(&envelope).map_err(CoreError::serialization)?;
        if let Err(err) = self.transport.send(bytes, endpoint).await {
            self.client_streams.cancel_open(call_id);
            return Err(err.into());
        }

        await_stream_open(id_rx, item_rx).await
    }

    /// Matches an incoming `response` by call id and completes its sink
    /// exactly once; unknown call ids are late responses to an already
    /// cancelled or completed call and are dropped (spec §4.1).
    pub fn complete_pending_call(&self, response: ResponseEnvelope) {
        let call_id = response.call_id();
        let result = match response {
            ResponseEnvelope::Success { result, .. } => Ok(result),
            ResponseEnvelope::Failure { error, .. } => Err(CoreError::RemoteInvocationFailed(error)),
        };
        if !self.pending_calls.complete(call_id, result) {
            debug!(%call_id, "completePendingCall for unknown call id, dropping");
        }
    }

    pub fn on_stream_start(&self, envelope: StreamStartEnvelope) {
        self.client_streams.on_stream_start(envelope);
    }

    pub async fn on_stream_data(&self, envelope: StreamDataEnvelope) {
        self.client_streams.on_stream_data(envelope).await;
    }

    pub async fn on_stream_end(&self, envelope: StreamEndEnvelope) {
        self.client_streams.on_stream_end(envelope).await;
    }

    pub async fn on_stream_error(&self, envelope: StreamErrorEnvelope) {
        self.client_streams.on_stream_error(envelope).await;
    }

    pub fn client_streams(&self) -> &ClientStreamTable {
        &self.client_streams
    }

    /// Called when the transport session is lost: every pending call
    /// fails with `connectionClosed`, and every active stream observes a
    /// synthesized end (spec §3, §4.5).
    pub async fn on_connection_closed(&self) {
        self.pending_calls.fail_all(CoreError::ConnectionClosed);
        self.client_streams.synthesize_connection_closed().await;
    }

    /// Dispatches a decoded invocation to a local actor's method, deciding
    /// by the target's prefix whether it is a synchronous call or a stream
    /// opener (spec §4.1 `executeTarget` / `executeStreamingTarget`).
    pub async fn execute_target(
        &self,
        envelope: &InvocationEnvelope,
        local_actor: &dyn LocalActor,
    ) -> Result<Vec<u8>, CoreError> {
        local_actor.invoke(&envelope.target, envelope.args.clone()).await
    }

    pub fn execute_streaming_target(
        &self,
        envelope: &InvocationEnvelope,
        local_actor: &dyn LocalActor,
    ) -> BoxByteStream {
        local_actor.invoke_stream(&envelope.target, envelope.args.clone())
    }

    /// Also used by `StreamFilterDescriptor`-carrying invocations to
    /// forward the filter request unchanged to the server-side table.
    pub fn stream_filter_of(envelope: &InvocationEnvelope) -> Option<StreamFilterDescriptor> {
        envelope.stream_filter.clone()
    }
}

struct CancelOnDrop<'a> {
    table: &'a PendingCallTable,
    call_id: Uuid,
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.table.cancel(self.call_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use meridian_common::Endpoint;
    use meridian_transport::WebSocketTransport;
    use std::time::Duration;

    struct Echo(ActorId);

    #[async_trait]
    impl LocalActor for Echo {
        fn id(&self) -> &ActorId {
            &self.0
        }

        async fn invoke(&self, _target: &str, args: Vec<Vec<u8>>) -> Result<Vec<u8>, CoreError> {
            Ok(args.into_iter().next().unwrap_or_default())
        }

        fn invoke_stream(&self, _target: &str, _args: Vec<Vec<u8>>) -> BoxByteStream {
            Box::pin(stream::iter(vec![Ok(vec![1]), Ok(vec![2])]))
        }
    }

    #[test]
    fn assign_id_is_unique_and_local() {
        let system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let a = system.assign_id("room");
        let b = system.assign_id("room");
        assert_ne!(a, b);
        assert!(a.is_local());
    }

    #[test]
    fn resolve_prefers_local_registration() {
        let system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let id = ActorId::local("room-1");
        system.register_local(Arc::new(Echo(id.clone())));
        match system.resolve(&id) {
            Ok(ResolvedActor::Local(_)) => {}
            _ => panic!("expected local resolution"),
        }
    }

    #[test]
    fn resolve_falls_back_to_remote_proxy() {
        let system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let id = ActorId::remote("room-1", Endpoint::new("10.0.0.1", 9000));
        match system.resolve(&id) {
            Ok(ResolvedActor::Remote(resolved)) => assert_eq!(resolved, id),
            _ => panic!("expected remote proxy"),
        }
    }

    #[test]
    fn resolve_local_unregistered_is_actor_not_found() {
        let system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let id = ActorId::local("ghost");
        assert!(matches!(system.resolve(&id), Err(CoreError::ActorNotFound(_))));
    }

    #[test]
    fn register_and_unregister_local_record_actors_active() {
        let metrics = Arc::new(MetricsCollector::default());
        let system =
            ActorSystem::new_with_metrics(MeridianConfig::default(), WebSocketTransport::new(4), metrics.clone());
        let id = ActorId::local("room-1");
        system.register_local(Arc::new(Echo(id.clone())));
        assert_eq!(
            metrics.flush().gauges[&(names::ACTORS_ACTIVE.to_string(), Vec::new())],
            1.0
        );

        system.unregister_local(&id);
        assert_eq!(
            metrics.flush().gauges[&(names::ACTORS_ACTIVE.to_string(), Vec::new())],
            0.0
        );
    }

    #[test]
    fn stream_opener_prefix_is_respected() {
        let system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        assert!(system.is_stream_opener("observeState"));
        assert!(!system.is_stream_opener("greet"));
    }

    #[tokio::test]
    async fn remote_call_round_trips_over_loopback_transport() {
        let server = WebSocketTransport::new(64);
        let endpoint = Endpoint::new("127.0.0.1", 18921);
        server.listen(endpoint.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let client = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(64));
        let actor = ActorId::remote("room-1", endpoint.clone());

        let responder = {
            use futures::StreamExt;
            let mut incoming = server.incoming();
            tokio::spawn(async move {
                let message = incoming.next().await.expect("no inbound invocation");
                let envelope: TransportEnvelope = serde_json::from_slice(&message.bytes).unwrap();
                let call_id = envelope.call_id().unwrap();
                let response = TransportEnvelope::Response(ResponseEnvelope::Success {
                    call_id,
                    result: b"Hello, alice!".to_vec(),
                });
                message
                    .respond
                    .respond(serde_json::to_vec(&response).unwrap())
                    .await
                    .unwrap();
            })
        };

        let result = client
            .remote_call(&actor, "greet", vec![b"\"alice\"".to_vec()])
            .await
            .unwrap();
        assert_eq!(result, b"Hello, alice!");
        responder.await.unwrap();
        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn complete_pending_call_for_unknown_call_id_is_a_no_op() {
        let system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        system.complete_pending_call(ResponseEnvelope::Success {
            call_id: Uuid::new_v4(),
            result: vec![],
        });
    }

    #[tokio::test]
    async fn on_connection_closed_fails_every_pending_call() {
        let system = ActorSystem::new(MeridianConfig::default(), WebSocketTransport::new(4));
        let call_id = Uuid::new_v4();
        let rx = system.pending_calls.register(call_id);
        system.on_connection_closed().await;
        assert_eq!(rx.await.unwrap(), Err(CoreError::ConnectionClosed));
    }
}
