//! Synthesis: merge every role's output into a plan, a task checklist, and a
//! risk verdict.
//!
//! The model is asked for three headed sections. [`parse_sections`] is
//! order-sensitive and fails closed on its markers: a missing, repeated, or
//! out-of-order marker makes the response incomplete. An empty body is kept
//! as an empty string. [`run_synthesis`] retries an incomplete response up to
//! a fixed number of passes and then returns [`SynthesisResult::fallback`]
//! without further model calls.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::budget::TokenLedger;
use crate::meeting::orchestrator::RunPhase;
use crate::meeting::outputs::RoleOutputs;
use crate::meeting::prompt::{render_synthesis_prompt, MeetingRequest};
use crate::meeting::roles::SYNTHESIS_SYSTEM_PROMPT;
use crate::services::CompletionService;
use crate::trace::{with_context, TraceContext};

pub const PLAN_MARKER: &str = "## PLAN";
pub const TASKS_MARKER: &str = "## ATOMIC TASKS";
pub const RISK_MARKER: &str = "## RISK VERDICT";

/// Ledger role name for synthesis usage.
pub const SYNTHESIS_ROLE: &str = "Synthesis";

/// Default number of synthesis calls before falling back.
pub const MAX_SYNTHESIS_PASSES: u32 = 2;

/// Output cap for the synthesis call.
pub const SYNTHESIS_MAX_TOKENS: u32 = 2000;

const MARKERS: [&str; 3] = [PLAN_MARKER, TASKS_MARKER, RISK_MARKER];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub plan: String,
    pub atomic_tasks: String,
    pub risk_verdict: String,
}

impl SynthesisResult {
    /// Degraded result returned once every pass came back incomplete.
    pub fn fallback() -> Self {
        Self {
            plan: "Synthesis aborted: max passes reached.".to_string(),
            atomic_tasks: "- [ ] Review meeting logs manually".to_string(),
            risk_verdict: "HIGH — synthesis incomplete".to_string(),
        }
    }
}

/// Why a synthesis response could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SectionParseError {
    #[error("section {0:?} not found")]
    Missing(&'static str),

    #[error("section {0:?} appears more than once")]
    Duplicate(&'static str),

    #[error("section {0:?} appears before the section preceding it")]
    OutOfOrder(&'static str),
}

/// Byte spans of a marker line: where it starts and where its body begins.
struct MarkerLine {
    start: usize,
    body_start: usize,
}

fn find_marker_lines(text: &str, marker: &str) -> Vec<MarkerLine> {
    let mut found = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end() == marker {
            found.push(MarkerLine {
                start: offset,
                body_start: offset + line.len(),
            });
        }
        offset += line.len();
    }
    found
}

/// Split a response into its three sections.
///
/// A marker only counts when it stands alone on its line (trailing
/// whitespace allowed). Each body is the trimmed text up to the next marker
/// line, or the end of the text for the last section.
pub fn parse_sections(text: &str) -> Result<SynthesisResult, SectionParseError> {
    let mut lines = Vec::with_capacity(MARKERS.len());
    for marker in MARKERS {
        let mut hits = find_marker_lines(text, marker);
        match hits.len() {
            0 => return Err(SectionParseError::Missing(marker)),
            1 => lines.push((marker, hits.remove(0))),
            _ => return Err(SectionParseError::Duplicate(marker)),
        }
    }

    for pair in lines.windows(2) {
        if pair[1].1.start < pair[0].1.body_start {
            return Err(SectionParseError::OutOfOrder(pair[1].0));
        }
    }

    let mut bodies = Vec::with_capacity(MARKERS.len());
    for (i, (_, line)) in lines.iter().enumerate() {
        let end = lines.get(i + 1).map(|(_, next)| next.start).unwrap_or(text.len());
        bodies.push(text[line.body_start..end].trim().to_string());
    }

    let risk_verdict = bodies.pop().unwrap_or_default();
    let atomic_tasks = bodies.pop().unwrap_or_default();
    let plan = bodies.pop().unwrap_or_default();
    Ok(SynthesisResult {
        plan,
        atomic_tasks,
        risk_verdict,
    })
}

/// Result of the synthesis stage together with how it was reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub result: SynthesisResult,
    /// Number of completion calls made.
    pub passes: u32,
    pub fallback_used: bool,
}

/// Run synthesis with a bounded retry.
///
/// Always makes at least one call, regardless of budget state. The prompt is
/// rebuilt identically on each pass. Usage of every pass that returned a
/// response is added to `ledger` once that response arrives.
pub async fn run_synthesis(
    ctx: &TraceContext,
    completion: &dyn CompletionService,
    request: &MeetingRequest,
    outputs: &RoleOutputs,
    ledger: &mut TokenLedger,
    max_passes: u32,
    max_tokens: u32,
) -> SynthesisOutcome {
    let max_passes = max_passes.max(1);
    for pass in 1..=max_passes {
        info!(
            event = "meeting.phase",
            phase = %RunPhase::Synthesizing(pass),
            trace_id = %ctx.id()
        );
        let user_prompt = render_synthesis_prompt(request, outputs);
        let response = with_context(
            ctx,
            &format!("Synthesis pass {pass}"),
            completion.complete(SYNTHESIS_SYSTEM_PROMPT, &user_prompt, max_tokens),
        )
        .await;

        let reply = match response {
            Ok(reply) => reply,
            Err(e) => {
                warn!(event = "synthesis.incomplete", pass = pass, error = %e);
                continue;
            }
        };
        ledger.record(SYNTHESIS_ROLE, reply.tokens_used);

        match parse_sections(&reply.text) {
            Ok(result) => {
                return SynthesisOutcome {
                    result,
                    passes: pass,
                    fallback_used: false,
                }
            }
            Err(e) => warn!(event = "synthesis.incomplete", pass = pass, error = %e),
        }
    }

    warn!(
        event = "synthesis.fallback",
        trace_id = %ctx.id(),
        passes = max_passes,
        "max synthesis passes reached"
    );
    SynthesisOutcome {
        result: SynthesisResult::fallback(),
        passes: max_passes,
        fallback_used: true,
    }
}
