//! Error taxonomy for the orchestration engine.

use crate::services::ServiceError;

/// Errors produced when a stage's data fails its contract.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("field {field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("field {field} contains a blank entry at index {index}")]
    BlankEntry { field: &'static str, index: usize },

    #[error("repo must be in owner/name format, got {0:?}")]
    InvalidRepo(String),

    #[error("intent mismatch: requested {expected}, payload says {actual}")]
    IntentMismatch {
        expected: crate::domain::Intent,
        actual: crate::domain::Intent,
    },

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Top-level errors surfaced to callers of the engine.
///
/// Business outcomes (a role erroring, the budget running out, synthesis
/// falling back) are not errors and never appear here. Only contract
/// violations and failures of the caller-facing collaborators do.
#[derive(Debug, thiserror::Error)]
pub enum CouncilError {
    #[error("contract violation in {stage}: {source}")]
    Contract {
        stage: &'static str,
        #[source]
        source: SchemaError,
    },

    #[error("service error: {0}")]
    Service(#[from] ServiceError),

    #[error("webhook rejected: {0}")]
    Webhook(#[from] crate::webhook::WebhookError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CouncilError {
    /// Attribute a schema failure to the stage that produced the data.
    pub fn contract(stage: &'static str, source: SchemaError) -> Self {
        CouncilError::Contract { stage, source }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, CouncilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_names_stage_and_cause() {
        let err = CouncilError::contract("planner", SchemaError::EmptyField { field: "summary" });
        let msg = err.to_string();
        assert!(msg.contains("planner"));
        assert!(msg.contains("summary"));
    }

    #[test]
    fn test_service_error_converts() {
        let err: CouncilError = ServiceError::Permanent("401 unauthorized".to_string()).into();
        assert!(err.to_string().contains("401 unauthorized"));
    }
}
