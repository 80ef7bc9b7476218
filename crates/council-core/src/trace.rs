//! Per-invocation trace context and the logging wrapper around async work.
//!
//! A [`TraceContext`] is created once per inbound event and passed by
//! reference through every stage. [`with_context`] runs one unit of work
//! inside a `council.op` span and logs start, completion, and failure with
//! the elapsed time.

use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, Instrument};
use uuid::Uuid;

/// Where an invocation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    TrackerWebhook,
    ChatMessage,
    Internal,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Origin::TrackerWebhook => "tracker_webhook",
            Origin::ChatMessage => "chat_message",
            Origin::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Immutable identity of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    id: String,
    origin: Origin,
    created_at: DateTime<Utc>,
}

impl TraceContext {
    /// Fresh context with a random id.
    pub fn new(origin: Origin) -> Self {
        Self::with_id(origin, Uuid::new_v4().to_string())
    }

    /// Context reusing an id supplied by the caller (e.g. a webhook delivery id).
    pub fn with_id(origin: Origin, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            origin,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Span tagged with this context, for work that is not wrapped by [`with_context`].
    pub fn span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "council.op",
            trace_id = %self.id,
            origin = %self.origin,
            operation = %operation,
        )
    }
}

/// Run `fut` exactly once under `ctx`, logging its lifecycle.
///
/// The error, if any, is returned to the caller unchanged.
pub async fn with_context<T, E, Fut>(ctx: &TraceContext, operation: &str, fut: Fut) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let span = ctx.span(operation);
    async move {
        info!(event = "op.started", trace_id = %ctx.id, origin = %ctx.origin, operation = %operation);
        let start = Instant::now();
        let outcome = fut.await;
        let duration_ms = start.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => info!(
                event = "op.completed",
                trace_id = %ctx.id,
                operation = %operation,
                duration_ms = duration_ms,
            ),
            Err(e) => error!(
                event = "op.failed",
                trace_id = %ctx.id,
                operation = %operation,
                duration_ms = duration_ms,
                error = %e,
            ),
        }
        outcome
    }
    .instrument(span)
    .await
}
