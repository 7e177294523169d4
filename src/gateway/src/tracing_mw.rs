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
use std::time::{Duration, Instant};

use async_trait::async_trait;
use meridian_common::{InvocationEnvelope, MiddlewareContext, TraceContext};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::middleware::{Middleware, Next};

/// One completed invocation's trace, handed to a [`TraceExporter`]
/// after the chain below this middleware has run (spec §4.6, §4.7).
#[derive(Debug, Clone)]
pub struct TraceRecord {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Sink for completed [`TraceRecord`]s. An exporter failure is logged
/// and otherwise ignored — tracing is observability, never a reason to
/// fail the invocation it describes.
pub trait TraceExporter: Send + Sync {
    fn export(&self, record: TraceRecord);
}

/// Logs every record at `info` via `tracing`. The default exporter when
/// nothing more specific (e.g. an OTLP sink) is wired in.
pub struct LoggingTraceExporter;

impl TraceExporter for LoggingTraceExporter {
    fn export(&self, record: TraceRecord) {
        if record.success {
            tracing::info!(
                trace_id = %record.trace_id,
                span_id = %record.span_id,
                name = %record.name,
                duration_ms = record.duration.as_secs_f64() * 1000.0,
                "invocation completed"
            );
        } else {
            tracing::info!(
                trace_id = %record.trace_id,
                span_id = %record.span_id,
                name = %record.name,
                duration_ms = record.duration.as_secs_f64() * 1000.0,
                error = record.error.as_deref().unwrap_or(""),
                "invocation failed"
            );
        }
    }
}

/// Ensures every invocation carries a [`TraceContext`] (generating one
/// if absent), opens a `tracing` span around the rest of the chain, and
/// exports a [`TraceRecord`] once it resolves (spec §4.6).
pub struct TracingMiddleware {
    exporter: Arc<dyn TraceExporter>,
}

impl TracingMiddleware {
    pub fn new(exporter: Arc<dyn TraceExporter>) -> Self {
        Self { exporter }
    }
}

#[async_trait]
impl Middleware for TracingMiddleware {
    async fn process(
        &self,
        mut envelope: InvocationEnvelope,
        context: MiddlewareContext,
        next: Next,
    ) -> Result<Vec<u8>, GatewayError> {
        let trace_context = envelope.trace_context.clone().unwrap_or_else(|| TraceContext {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
        });
        envelope.trace_context = Some(trace_context.clone());

        let name = format!("{}.{}", envelope.actor.id, envelope.target);
        let span = tracing::info_span!("invocation", name = %name, trace_id = %trace_context.trace_id);
        let started = Instant::now();

        let result = next.run(envelope, context).instrument(span).await;

        self.exporter.export(TraceRecord {
            trace_id: trace_context.trace_id,
            span_id: trace_context.span_id,
            name,
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
            duration: started.elapsed(),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_common::ActorId;
    use parking_lot::Mutex;
    use std::sync::Arc as StdArc;

    struct CapturingExporter(StdArc<Mutex<Vec<TraceRecord>>>);

    impl TraceExporter for CapturingExporter {
        fn export(&self, record: TraceRecord) {
            self.0.lock().push(record);
        }
    }

    fn envelope() -> InvocationEnvelope {
        InvocationEnvelope {
            call_id: Uuid::new_v4(),
            actor: ActorId::local("room-1"),
            target: "greet".into(),
            args: vec![],
            generics: vec![],
            trace_context: None,
            stream_filter: None,
        }
    }

    #[tokio::test]
    async fn generates_a_trace_context_when_absent_and_exports_on_success() {
        let captured = StdArc::new(Mutex::new(Vec::new()));
        let mw = TracingMiddleware::new(Arc::new(CapturingExporter(captured.clone())));
        let middlewares: Arc<Vec<Arc<dyn Middleware>>> = Arc::new(vec![]);
        let next = Next::new(middlewares, Arc::new(|_, _| Box::pin(async { Ok(b"ok".to_vec()) })));

        let result = mw.process(envelope(), MiddlewareContext::new(), next).await;
        assert!(result.is_ok());
        let records = captured.lock();
        assert_eq!(records.len(), 1);
        assert!(records[0].success);
        assert_eq!(records[0].name, "room-1.greet");
    }

    #[tokio::test]
    async fn exports_the_error_message_on_failure() {
        let captured = StdArc::new(Mutex::new(Vec::new()));
        let mw = TracingMiddleware::new(Arc::new(CapturingExporter(captured.clone())));
        let middlewares: Arc<Vec<Arc<dyn Middleware>>> = Arc::new(vec![]);
        let next = Next::new(
            middlewares,
            Arc::new(|_, _| Box::pin(async { Err(GatewayError::Validation("bad".into())) })),
        );

        let result = mw.process(envelope(), MiddlewareContext::new(), next).await;
        assert!(result.is_err());
        let records = captured.lock();
        assert!(!records[0].success);
        assert!(records[0].error.is_some());
    }
}
