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

use async_trait::async_trait;
use meridian_common::{InvocationEnvelope, MiddlewareContext, ValidationLimits};

use crate::error::GatewayError;
use crate::middleware::{Middleware, Next};

/// Rejects malformed or oversized invocations before they reach a
/// handler (spec §4.6), against a configured [`ValidationLimits`].
pub struct ValidationMiddleware {
    limits: ValidationLimits,
}

impl ValidationMiddleware {
    pub fn new(limits: ValidationLimits) -> Self {
        Self { limits }
    }
}

#[async_trait]
impl Middleware for ValidationMiddleware {
    async fn process(
        &self,
        envelope: InvocationEnvelope,
        context: MiddlewareContext,
        next: Next,
    ) -> Result<Vec<u8>, GatewayError> {
        if envelope.actor.id.is_empty() {
            return Err(GatewayError::Validation("actor id must not be empty".into()));
        }
        if envelope.actor.id.len() > self.limits.max_actor_id_len {
            return Err(GatewayError::Validation(format!(
                "actor id exceeds {} bytes",
                self.limits.max_actor_id_len
            )));
        }
        if envelope.target.is_empty() {
            return Err(GatewayError::Validation("target method must not be empty".into()));
        }
        if envelope.target.len() > self.limits.max_method_name_len {
            return Err(GatewayError::Validation(format!(
                "method name exceeds {} bytes",
                self.limits.max_method_name_len
            )));
        }
        let mut total = 0usize;
        for arg in &envelope.args {
            if arg.len() > self.limits.max_argument_bytes {
                return Err(GatewayError::Validation(format!(
                    "argument exceeds {} bytes",
                    self.limits.max_argument_bytes
                )));
            }
            total += arg.len();
        }
        if total > self.limits.max_total_argument_bytes {
            return Err(GatewayError::Validation(format!(
                "total argument bytes exceed {}",
                self.limits.max_total_argument_bytes
            )));
        }
        next.run(envelope, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::ActorId;
    use uuid::Uuid;

    fn envelope_with(actor_id: &str, target: &str, args: Vec<Vec<u8>>) -> InvocationEnvelope {
        InvocationEnvelope {
            call_id: Uuid::new_v4(),
            actor: ActorId::local(actor_id),
            target: target.to_string(),
            args,
            generics: vec![],
            trace_context: None,
            stream_filter: None,
        }
    }

    async fn run(mw: &ValidationMiddleware, envelope: InvocationEnvelope) -> Result<Vec<u8>, GatewayError> {
        use std::sync::Arc;
        let middlewares: Arc<Vec<Arc<dyn Middleware>>> = Arc::new(vec![]);
        let terminal: crate::middleware::Next = crate::middleware::Next::new(
            middlewares,
            Arc::new(|_, _| Box::pin(async { Ok(b"reached".to_vec()) })),
        );
        mw.process(envelope, MiddlewareContext::new(), terminal).await
    }

    #[tokio::test]
    async fn rejects_empty_actor_id() {
        let mw = ValidationMiddleware::new(ValidationLimits::default());
        let result = run(&mw, envelope_with("", "greet", vec![])).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn rejects_oversized_argument() {
        let limits = ValidationLimits { max_argument_bytes: 4, ..ValidationLimits::default() };
        let mw = ValidationMiddleware::new(limits);
        let result = run(&mw, envelope_with("room-1", "greet", vec![vec![0u8; 5]])).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn passes_a_well_formed_envelope() {
        let mw = ValidationMiddleware::new(ValidationLimits::default());
        let result = run(&mw, envelope_with("room-1", "greet", vec![vec![1, 2, 3]])).await;
        assert_eq!(result.unwrap(), b"reached".to_vec());
    }
}
