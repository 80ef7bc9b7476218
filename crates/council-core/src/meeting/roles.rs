//! The six meeting roles, their instructions, and their output caps.

use serde::{Deserialize, Serialize};

/// A fixed perspective that issues one completion call per meeting.
///
/// Variant order is the execution order, so `Ord` sorts roles the way the
/// meeting runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MeetingRole {
    Architect,
    #[serde(rename = "PM")]
    Pm,
    MobileEngineer,
    BackendEngineer,
    #[serde(rename = "QA")]
    Qa,
    Security,
}

impl MeetingRole {
    /// Every role, in execution order.
    pub const ORDER: [MeetingRole; 6] = [
        MeetingRole::Architect,
        MeetingRole::Pm,
        MeetingRole::MobileEngineer,
        MeetingRole::BackendEngineer,
        MeetingRole::Qa,
        MeetingRole::Security,
    ];

    /// Header name used in prompts and ledger entries.
    pub fn name(&self) -> &'static str {
        match self {
            MeetingRole::Architect => "Architect",
            MeetingRole::Pm => "PM",
            MeetingRole::MobileEngineer => "MobileEngineer",
            MeetingRole::BackendEngineer => "BackendEngineer",
            MeetingRole::Qa => "QA",
            MeetingRole::Security => "Security",
        }
    }

    /// Zero-based position in [`MeetingRole::ORDER`].
    pub fn position(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|r| r == self)
            .unwrap_or(Self::ORDER.len())
    }

    /// Maximum output tokens requested for this role's call.
    pub fn max_output_tokens(&self) -> u32 {
        match self {
            MeetingRole::Architect => 1200,
            MeetingRole::Pm => 800,
            MeetingRole::MobileEngineer => 1000,
            MeetingRole::BackendEngineer => 1000,
            MeetingRole::Qa => 800,
            MeetingRole::Security => 600,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            MeetingRole::Architect => ARCHITECT_PROMPT,
            MeetingRole::Pm => PM_PROMPT,
            MeetingRole::MobileEngineer => MOBILE_PROMPT,
            MeetingRole::BackendEngineer => BACKEND_PROMPT,
            MeetingRole::Qa => QA_PROMPT,
            MeetingRole::Security => SECURITY_PROMPT,
        }
    }
}

impl std::fmt::Display for MeetingRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const ARCHITECT_PROMPT: &str = "You are the Lead Architect on a product team shipping a mobile app with a hosted Postgres backend.
Your role: design the system architecture, identify technical dependencies, and define the technical approach.
Output format:
- Architecture decisions
- Dependencies & risks
- Key technical constraints
Keep your response focused. Max 3 bullet points per section.";

const PM_PROMPT: &str = "You are the Product Manager on the team.
Your role: turn the request into a clear user story, define scope boundaries, and set priority.
Output format:
- User story (As a user I want...)
- Acceptance criteria (3-5 items)
- Out of scope
- Priority level (P0/P1/P2) with justification";

const MOBILE_PROMPT: &str = "You are the Mobile Engineer on the team.
Your role: define exactly how the feature is implemented in the mobile client.
Output format:
- Files to create/modify (with path)
- Key implementation notes
- Platform considerations (permissions, native modules, etc.)";

const BACKEND_PROMPT: &str = "You are the Backend Engineer on the team. The backend is Postgres plus serverless functions.
Your role: define the backend changes required: schema migrations, functions, access policies.
Output format:
- SQL changes (table/column/index)
- Functions to create/modify
- Access policies needed";

const QA_PROMPT: &str = "You are the QA Engineer on the team.
Your role: define the test plan for this feature.
Output format:
- Happy path test cases (numbered)
- Edge cases and failure modes
- Data validation checks
Reference concrete UI states or API responses where possible.";

const SECURITY_PROMPT: &str = "You are the Security Engineer on a team handling sensitive user data.
Your role: identify security, auth, or data-privacy concerns in the proposed feature.
Output format:
- Security risks (if any)
- Mitigations
- Final verdict: SAFE / NEEDS_REVIEW / BLOCK (with one-line reason)";

/// Instructions for the synthesis call. The three headers are the wire
/// contract parsed by [`super::synthesis::parse_sections`].
pub const SYNTHESIS_SYSTEM_PROMPT: &str = "You are the Lead Orchestrator synthesizing a multi-agent meeting.
Given the outputs from the Architect, PM, Mobile Engineer, Backend Engineer, QA, and Security agents, produce a final structured plan.

Output EXACTLY this format (use markdown headers):

## PLAN
Ordered numbered steps to implement this feature.

## ATOMIC TASKS
Tracker-ready checklist. Each item must be:
- [ ] action verb + specific component/file + expected outcome

## RISK VERDICT
One of: LOW / MEDIUM / HIGH
Followed by 2-3 sentences explaining the key risks and whether to proceed.";
