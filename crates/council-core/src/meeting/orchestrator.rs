//! Six-role sequential meeting.
//!
//! Roles run strictly in [`MeetingRole::ORDER`]: each prompt embeds every
//! earlier role's output, so no two steps of one run may overlap. The budget
//! gate is checked before each role; once it trips, the remaining roles are
//! skipped. Synthesis always runs once the roles are done.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};

use crate::budget::{TokenLedger, TokenUsage, HARD_BUDGET};
use crate::meeting::outputs::RoleOutputs;
use crate::meeting::prompt::{render_base_prompt, render_memory_context, MeetingRequest};
use crate::meeting::roles::MeetingRole;
use crate::meeting::step::{RoleStepReport, StepExecutor};
use crate::meeting::synthesis::{
    run_synthesis, SynthesisResult, MAX_SYNTHESIS_PASSES, SYNTHESIS_MAX_TOKENS,
};
use crate::services::{CompletionService, MemoryService, MemorySummary};
use crate::trace::TraceContext;

/// Tunables for one meeting run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingConfig {
    /// Hard cap on cumulative tokens before remaining roles are skipped.
    pub token_budget: u64,
    pub max_synthesis_passes: u32,
    pub synthesis_max_tokens: u32,
    /// Number of prior summaries pulled in as prompt context.
    pub memory_top_k: usize,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            token_budget: HARD_BUDGET,
            max_synthesis_passes: MAX_SYNTHESIS_PASSES,
            synthesis_max_tokens: SYNTHESIS_MAX_TOKENS,
            memory_top_k: 5,
        }
    }
}

/// Where a run currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Running(MeetingRole),
    Synthesizing(u32),
    Complete,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::NotStarted => write!(f, "not_started"),
            RunPhase::Running(role) => write!(f, "running:{role}"),
            RunPhase::Synthesizing(pass) => write!(f, "synthesizing:{pass}"),
            RunPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Everything a finished meeting produced.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingReport {
    pub trace_id: String,
    pub synthesis: SynthesisResult,
    pub total_tokens: u64,
    pub usage: Vec<TokenUsage>,
    pub usage_summary: String,
    pub outputs: RoleOutputs,
    pub steps: Vec<RoleStepReport>,
    pub synthesis_passes: u32,
    pub fallback_used: bool,
}

impl MeetingReport {
    pub fn completed_roles(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_completed()).count()
    }

    pub fn skipped_roles(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_skipped()).count()
    }

    pub fn errored_roles(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome.is_errored()).count()
    }
}

/// Runs meetings against injected collaborators.
///
/// Cheap to clone and safe to share: every call to [`MeetingOrchestrator::run`]
/// builds its own ledger and output map.
#[derive(Clone)]
pub struct MeetingOrchestrator {
    completion: Arc<dyn CompletionService>,
    memory: Arc<dyn MemoryService>,
    config: MeetingConfig,
}

impl MeetingOrchestrator {
    pub fn new(completion: Arc<dyn CompletionService>, memory: Arc<dyn MemoryService>) -> Self {
        Self {
            completion,
            memory,
            config: MeetingConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MeetingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MeetingConfig {
        &self.config
    }

    /// Run all roles and synthesis for `request`.
    ///
    /// Never fails: role errors, budget exhaustion, and incomplete synthesis
    /// all end up as markers or the fallback inside the report.
    pub async fn run(&self, ctx: &TraceContext, request: &MeetingRequest) -> MeetingReport {
        self.run_inner(ctx, request)
            .instrument(ctx.span("Meeting"))
            .await
    }

    async fn run_inner(&self, ctx: &TraceContext, request: &MeetingRequest) -> MeetingReport {
        let mut phase = RunPhase::NotStarted;
        info!(event = "meeting.phase", phase = %phase, intent = %request.intent);

        let mut ledger = TokenLedger::with_cap(self.config.token_budget);
        let mut outputs = RoleOutputs::new();
        let mut steps = Vec::with_capacity(MeetingRole::ORDER.len());

        let memories = self.fetch_memories(request).await;
        let base_prompt = render_base_prompt(request, &render_memory_context(&memories));
        let executor = StepExecutor::new(self.completion.as_ref(), self.memory.as_ref());

        for role in MeetingRole::ORDER {
            phase = RunPhase::Running(role);
            info!(event = "meeting.phase", phase = %phase);

            let report = if ledger.is_over_budget() {
                executor.skip(role, &mut outputs)
            } else {
                executor
                    .execute(ctx, request, role, &base_prompt, &mut outputs, &mut ledger)
                    .await
            };
            steps.push(report);
        }

        // Each pass logs its own Synthesizing(pass) transition.
        let synthesis = run_synthesis(
            ctx,
            self.completion.as_ref(),
            request,
            &outputs,
            &mut ledger,
            self.config.max_synthesis_passes,
            self.config.synthesis_max_tokens,
        )
        .await;

        phase = RunPhase::Complete;
        info!(
            event = "meeting.phase",
            phase = %phase,
            total_tokens = ledger.total(),
            synthesis_passes = synthesis.passes,
            fallback_used = synthesis.fallback_used,
        );
        info!("{}", ledger.summary());

        MeetingReport {
            trace_id: ctx.id().to_string(),
            synthesis: synthesis.result,
            total_tokens: ledger.total(),
            usage: ledger.breakdown().to_vec(),
            usage_summary: ledger.summary(),
            outputs,
            steps,
            synthesis_passes: synthesis.passes,
            fallback_used: synthesis.fallback_used,
        }
    }

    /// Retrieval failures degrade to an empty context.
    async fn fetch_memories(&self, request: &MeetingRequest) -> Vec<MemorySummary> {
        match self
            .memory
            .search(&request.description, self.config.memory_top_k)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!(event = "meeting.memory_unavailable", error = %e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MeetingConfig::default();
        assert_eq!(config.token_budget, 25_000);
        assert_eq!(config.max_synthesis_passes, 2);
        assert_eq!(config.synthesis_max_tokens, 2000);
        assert_eq!(config.memory_top_k, 5);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::Running(MeetingRole::Qa).to_string(), "running:QA");
        assert_eq!(RunPhase::Synthesizing(2).to_string(), "synthesizing:2");
    }
}
