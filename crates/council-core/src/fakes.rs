//! In-memory test doubles for the service traits.
//!
//! Provides `ScriptedCompletion` and `InMemoryMemory`, which satisfy the
//! trait contracts without any network access and record every call for
//! later assertions. The issue tracker double is [`crate::tracker::LocalTracker`].

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::meeting::roles::{MeetingRole, SYNTHESIS_SYSTEM_PROMPT};
use crate::services::{
    Completion, CompletionService, MeetingLogEntry, MemoryService, MemorySummary, ServiceError,
    ServiceResult,
};

// ---------------------------------------------------------------------------
// ScriptedCompletion
// ---------------------------------------------------------------------------

/// Which caller a completion request came from, judged by its system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallTarget {
    Role(MeetingRole),
    Synthesis,
    Other,
}

impl CallTarget {
    fn classify(system_prompt: &str) -> Self {
        if system_prompt == SYNTHESIS_SYSTEM_PROMPT {
            return CallTarget::Synthesis;
        }
        MeetingRole::ORDER
            .iter()
            .find(|r| r.system_prompt() == system_prompt)
            .map(|r| CallTarget::Role(*r))
            .unwrap_or(CallTarget::Other)
    }
}

/// One recorded `complete` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub target: CallTarget,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_output_tokens: u32,
}

/// Completion service answering from per-target reply queues.
///
/// Each call pops the next scripted reply for its target; when a queue is
/// empty the default reply is used.
#[derive(Debug)]
pub struct ScriptedCompletion {
    queues: Mutex<HashMap<CallTarget, VecDeque<ServiceResult<Completion>>>>,
    default_reply: ServiceResult<Completion>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for ScriptedCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCompletion {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            default_reply: Ok(Completion {
                text: "[scripted output]".to_string(),
                tokens_used: 0,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default(mut self, text: impl Into<String>, tokens_used: u64) -> Self {
        self.default_reply = Ok(Completion {
            text: text.into(),
            tokens_used,
        });
        self
    }

    /// Queue a reply for `target`.
    pub fn respond(self, target: CallTarget, text: impl Into<String>, tokens_used: u64) -> Self {
        self.push(
            target,
            Ok(Completion {
                text: text.into(),
                tokens_used,
            }),
        )
    }

    /// Queue a failure for `target`.
    pub fn fail(self, target: CallTarget, error: ServiceError) -> Self {
        self.push(target, Err(error))
    }

    pub fn respond_role(self, role: MeetingRole, text: impl Into<String>, tokens_used: u64) -> Self {
        self.respond(CallTarget::Role(role), text, tokens_used)
    }

    pub fn fail_role(self, role: MeetingRole, error: ServiceError) -> Self {
        self.fail(CallTarget::Role(role), error)
    }

    pub fn respond_synthesis(self, text: impl Into<String>, tokens_used: u64) -> Self {
        self.respond(CallTarget::Synthesis, text, tokens_used)
    }

    fn push(self, target: CallTarget, reply: ServiceResult<Completion>) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(target)
            .or_default()
            .push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, target: CallTarget) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.target == target)
            .collect()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_output_tokens: u32,
    ) -> ServiceResult<Completion> {
        let target = CallTarget::classify(system_prompt);
        self.calls.lock().unwrap().push(RecordedCall {
            target,
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            max_output_tokens,
        });
        let scripted = self
            .queues
            .lock()
            .unwrap()
            .get_mut(&target)
            .and_then(|q| q.pop_front());
        scripted.unwrap_or_else(|| self.default_reply.clone())
    }
}

// ---------------------------------------------------------------------------
// InMemoryMemory
// ---------------------------------------------------------------------------

/// Memory service returning canned search hits and recording writes.
#[derive(Debug, Default)]
pub struct InMemoryMemory {
    hits: Vec<MemorySummary>,
    search_error: Option<String>,
    persist_error: Option<String>,
    queries: Mutex<Vec<(String, usize)>>,
    persisted: Mutex<Vec<MeetingLogEntry>>,
    summaries: Mutex<Vec<(String, Option<u64>)>>,
    deliveries: Mutex<HashSet<String>>,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summaries<I, S>(mut self, summaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hits = summaries
            .into_iter()
            .map(|s| MemorySummary {
                summary: s.into(),
                source_issue: None,
                score: 1.0,
                created_at: Utc::now(),
            })
            .collect();
        self
    }

    pub fn failing_search(mut self, reason: impl Into<String>) -> Self {
        self.search_error = Some(reason.into());
        self
    }

    pub fn failing_persist(mut self, reason: impl Into<String>) -> Self {
        self.persist_error = Some(reason.into());
        self
    }

    pub fn queries(&self) -> Vec<(String, usize)> {
        self.queries.lock().unwrap().clone()
    }

    pub fn persisted(&self) -> Vec<MeetingLogEntry> {
        self.persisted.lock().unwrap().clone()
    }

    pub fn saved_summaries(&self) -> Vec<(String, Option<u64>)> {
        self.summaries.lock().unwrap().clone()
    }
}

#[async_trait]
impl MemoryService for InMemoryMemory {
    async fn search(&self, query: &str, top_k: usize) -> ServiceResult<Vec<MemorySummary>> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), top_k));
        if let Some(reason) = &self.search_error {
            return Err(ServiceError::Transient(reason.clone()));
        }
        Ok(self.hits.iter().take(top_k).cloned().collect())
    }

    async fn persist(&self, entry: MeetingLogEntry) -> ServiceResult<()> {
        if let Some(reason) = &self.persist_error {
            return Err(ServiceError::Transient(reason.clone()));
        }
        self.persisted.lock().unwrap().push(entry);
        Ok(())
    }

    async fn save_summary(&self, summary: &str, source_issue: Option<u64>) -> ServiceResult<()> {
        if let Some(reason) = &self.persist_error {
            return Err(ServiceError::Transient(reason.clone()));
        }
        self.summaries
            .lock()
            .unwrap()
            .push((summary.to_string(), source_issue));
        Ok(())
    }

    async fn record_delivery(&self, delivery_id: &str) -> ServiceResult<bool> {
        if let Some(reason) = &self.persist_error {
            return Err(ServiceError::Transient(reason.clone()));
        }
        Ok(self
            .deliveries
            .lock()
            .unwrap()
            .insert(delivery_id.to_string()))
    }
}
