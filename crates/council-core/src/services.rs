//! Capability interfaces the engine calls into.
//!
//! - `CompletionService`: one system + user prompt in, text + usage out
//! - `MemoryService`: retrieval for prompt context, best-effort persistence
//! - `IssueTracker`: where the caller posts a finished plan
//!
//! All traits are async and backend-agnostic. In-memory fakes live in
//! [`crate::fakes`]; HTTP adapters in [`crate::openai`] and [`crate::github`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::meeting::synthesis::SynthesisResult;
use crate::trace::TraceContext;

/// Errors reported by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Worth retrying later (rate limit, 5xx, network blip).
    #[error("transient failure: {0}")]
    Transient(String),

    /// Retrying will not help (bad credentials, malformed request).
    #[error("permanent failure: {0}")]
    Permanent(String),

    /// The collaborator is not configured in this process.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

/// Result type for collaborator calls.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// A model response and the tokens it cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u64,
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: u32,
    ) -> ServiceResult<Completion>;
}

/// Stand-in for a completion backend that was not configured.
///
/// Every call fails with [`ServiceError::Unavailable`], so meeting roles
/// record an error marker instead of reaching a model.
#[derive(Debug, Clone)]
pub struct UnavailableCompletion {
    reason: String,
}

impl UnavailableCompletion {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CompletionService for UnavailableCompletion {
    async fn complete(&self, _: &str, _: &str, _: u32) -> ServiceResult<Completion> {
        Err(ServiceError::Unavailable(self.reason.clone()))
    }
}

/// A prior summary retrieved as prompt context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_issue: Option<u64>,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

/// Audit record of one role's raw output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingLogEntry {
    pub trace_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_number: Option<u64>,
    pub role: String,
    pub output: String,
    pub tokens_used: u64,
    /// SHA-256 hex of `output`.
    pub output_digest: String,
    pub recorded_at: DateTime<Utc>,
}

impl MeetingLogEntry {
    pub fn new(
        ctx: &TraceContext,
        issue_number: Option<u64>,
        role: impl Into<String>,
        output: impl Into<String>,
        tokens_used: u64,
    ) -> Self {
        use sha2::Digest as _;
        let output = output.into();
        let output_digest = hex::encode(sha2::Sha256::digest(output.as_bytes()));
        Self {
            trace_id: ctx.id().to_string(),
            issue_number,
            role: role.into(),
            output,
            tokens_used,
            output_digest,
            recorded_at: Utc::now(),
        }
    }
}

/// Whether a best-effort write landed. Never turned into an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistOutcome {
    Stored,
    Failed(String),
}

impl PersistOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PersistOutcome::Stored)
    }
}

impl<E: std::fmt::Display> From<std::result::Result<(), E>> for PersistOutcome {
    fn from(res: std::result::Result<(), E>) -> Self {
        match res {
            Ok(()) => PersistOutcome::Stored,
            Err(e) => PersistOutcome::Failed(e.to_string()),
        }
    }
}

#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Up to `top_k` summaries relevant to `query`, best match first.
    async fn search(&self, query: &str, top_k: usize) -> ServiceResult<Vec<MemorySummary>>;

    /// Store one role's raw output.
    async fn persist(&self, entry: MeetingLogEntry) -> ServiceResult<()>;

    /// Store the final summary of a run so later runs can retrieve it.
    async fn save_summary(&self, summary: &str, source_issue: Option<u64>) -> ServiceResult<()>;

    /// Mark a webhook delivery as seen. `Ok(false)` means it was already recorded.
    async fn record_delivery(&self, delivery_id: &str) -> ServiceResult<bool>;
}

/// Reference to an issue created in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub number: u64,
    pub url: String,
}

/// Snapshot of the most recent issue, for status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStatus {
    pub number: u64,
    pub url: String,
    pub state: String,
}

#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn create_issue(
        &self,
        ctx: &TraceContext,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> ServiceResult<IssueRef>;

    /// Post the synthesized plan as a comment on `issue_number`.
    async fn post_result(
        &self,
        ctx: &TraceContext,
        issue_number: u64,
        result: &SynthesisResult,
        total_tokens: u64,
    ) -> ServiceResult<()>;

    async fn last_issue(&self, ctx: &TraceContext) -> ServiceResult<Option<IssueStatus>>;
}
