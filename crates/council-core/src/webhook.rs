//! Tracker webhook ingress.
//!
//! Each delivery is traced under its own delivery id. A delivery id that
//! was already recorded is acknowledged and otherwise ignored. A failure to
//! record the id does not stop the delivery from being processed.

use serde::Serialize;
use tracing::{info, warn};

use crate::services::MemoryService;
use crate::trace::{with_context, Origin, TraceContext};

/// Operation name logged around the dedupe check.
pub const DEDUPE_OPERATION: &str = "Handle Webhook Dedupe";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("missing webhook delivery id")]
    MissingDeliveryId,
}

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Processed { trace_id: String },
    Duplicate { trace_id: String },
}

impl DeliveryOutcome {
    pub fn trace_id(&self) -> &str {
        match self {
            DeliveryOutcome::Processed { trace_id } | DeliveryOutcome::Duplicate { trace_id } => {
                trace_id
            }
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DeliveryOutcome::Duplicate { .. })
    }
}

/// Accept one delivery, deduplicating on `delivery_id`.
pub async fn handle_delivery(
    memory: &dyn MemoryService,
    delivery_id: Option<&str>,
) -> Result<DeliveryOutcome, WebhookError> {
    let Some(id) = delivery_id.map(str::trim).filter(|id| !id.is_empty()) else {
        warn!(event = "webhook.missing_delivery_id");
        return Err(WebhookError::MissingDeliveryId);
    };

    let ctx = TraceContext::with_id(Origin::TrackerWebhook, id);
    with_context(&ctx, DEDUPE_OPERATION, async {
        let trace_id = ctx.id().to_string();
        let outcome = match memory.record_delivery(id).await {
            Ok(false) => {
                info!(event = "webhook.duplicate", delivery_id = %id, "ignoring duplicate delivery");
                DeliveryOutcome::Duplicate { trace_id }
            }
            Ok(true) => {
                info!(event = "webhook.processing", delivery_id = %id);
                DeliveryOutcome::Processed { trace_id }
            }
            Err(e) => {
                warn!(event = "webhook.dedupe_unrecorded", delivery_id = %id, error = %e);
                DeliveryOutcome::Processed { trace_id }
            }
        };
        Ok::<_, WebhookError>(outcome)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::InMemoryMemory;

    #[tokio::test]
    async fn second_delivery_with_same_id_is_duplicate() {
        let memory = InMemoryMemory::new();
        let first = handle_delivery(&memory, Some("d-1")).await.unwrap();
        let again = handle_delivery(&memory, Some("d-1")).await.unwrap();
        let other = handle_delivery(&memory, Some("d-2")).await.unwrap();

        assert_eq!(
            first,
            DeliveryOutcome::Processed {
                trace_id: "d-1".to_string()
            }
        );
        assert!(again.is_duplicate());
        assert_eq!(again.trace_id(), "d-1");
        assert!(!other.is_duplicate());
    }

    #[tokio::test]
    async fn missing_or_blank_id_is_rejected() {
        let memory = InMemoryMemory::new();
        for id in [None, Some(""), Some("   ")] {
            assert_eq!(
                handle_delivery(&memory, id).await,
                Err(WebhookError::MissingDeliveryId)
            );
        }
    }

    #[tokio::test]
    async fn unrecorded_delivery_is_still_processed() {
        let memory = InMemoryMemory::new().failing_persist("read-only");
        let outcome = handle_delivery(&memory, Some("d-3")).await.unwrap();
        assert!(!outcome.is_duplicate());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(DeliveryOutcome::Duplicate {
            trace_id: "d-4".to_string(),
        })
        .unwrap();
        assert_eq!(json["status"], "duplicate");
        assert_eq!(json["trace_id"], "d-4");
    }
}
