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

use async_trait::async_trait;
use futures::future::BoxFuture;
use meridian_common::{InvocationEnvelope, MiddlewareContext};

use crate::error::GatewayError;

/// One link in the chain (spec §4.6): inspects or rewrites the envelope
/// and context, then either short-circuits with an error or calls
/// `next` to continue toward the actor dispatch. Composed outermost
/// first, so the first middleware in [`Gateway::new`]'s list is the
/// first to see the envelope and the last to see the result.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process(
        &self,
        envelope: InvocationEnvelope,
        context: MiddlewareContext,
        next: Next,
    ) -> Result<Vec<u8>, GatewayError>;
}

type TerminalFn =
    Arc<dyn Fn(InvocationEnvelope, MiddlewareContext) -> BoxFuture<'static, Result<Vec<u8>, GatewayError>> + Send + Sync>;

/// The remainder of the chain from a middleware's point of view. Owned
/// data only (no borrowed lifetimes) so it can be captured by the boxed
/// futures each link produces.
#[derive(Clone)]
pub struct Next {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
    index: usize,
    terminal: TerminalFn,
}

impl Next {
    pub(crate) fn new(middlewares: Arc<Vec<Arc<dyn Middleware>>>, terminal: TerminalFn) -> Self {
        Self { middlewares, index: 0, terminal }
    }

    /// Continues the chain: the next middleware if any remain, else the
    /// terminal dispatch.
    pub fn run(self, envelope: InvocationEnvelope, context: MiddlewareContext) -> BoxFuture<'static, Result<Vec<u8>, GatewayError>> {
        Box::pin(async move {
            match self.middlewares.get(self.index).cloned() {
                Some(middleware) => {
                    let next = Next {
                        middlewares: self.middlewares,
                        index: self.index + 1,
                        terminal: self.terminal,
                    };
                    middleware.process(envelope, context, next).await
                }
                None => (self.terminal)(envelope, context).await,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::ActorId;

    struct Passthrough;

    #[async_trait]
    impl Middleware for Passthrough {
        async fn process(
            &self,
            envelope: InvocationEnvelope,
            context: MiddlewareContext,
            next: Next,
        ) -> Result<Vec<u8>, GatewayError> {
            next.run(envelope, context).await
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn process(
            &self,
            _envelope: InvocationEnvelope,
            _context: MiddlewareContext,
            _next: Next,
        ) -> Result<Vec<u8>, GatewayError> {
            Err(GatewayError::Validation("always rejects".into()))
        }
    }

    fn envelope() -> InvocationEnvelope {
        InvocationEnvelope {
            call_id: uuid::Uuid::new_v4(),
            actor: ActorId::local("room-1"),
            target: "greet".into(),
            args: vec![],
            generics: vec![],
            trace_context: None,
            stream_filter: None,
        }
    }

    #[tokio::test]
    async fn chain_reaches_terminal_when_every_link_passes_through() {
        let middlewares: Arc<Vec<Arc<dyn Middleware>>> = Arc::new(vec![Arc::new(Passthrough), Arc::new(Passthrough)]);
        let terminal: TerminalFn = Arc::new(|_, _| Box::pin(async { Ok(b"ok".to_vec()) }));
        let next = Next::new(middlewares, terminal);
        let result = next.run(envelope(), MiddlewareContext::new()).await;
        assert_eq!(result.unwrap(), b"ok".to_vec());
    }

    #[tokio::test]
    async fn a_link_can_short_circuit_before_the_terminal() {
        let middlewares: Arc<Vec<Arc<dyn Middleware>>> = Arc::new(vec![Arc::new(ShortCircuit), Arc::new(Passthrough)]);
        let terminal: TerminalFn = Arc::new(|_, _| Box::pin(async { panic!("terminal should not run") }));
        let next = Next::new(middlewares, terminal);
        let result = next.run(envelope(), MiddlewareContext::new()).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }
}
