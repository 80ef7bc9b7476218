//! Council core library
//!
//! Turns a short engineering request into a structured plan, either through
//! a six-role sequential meeting with a synthesis pass or through a
//! Planner → Worker → Validator pipeline. Model, memory and tracker access
//! go through the traits in [`services`].

pub mod budget;
pub mod command;
pub mod dispatch;
pub mod domain;
pub mod fakes;
pub mod github;
pub mod meeting;
pub mod memory;
pub mod openai;
pub mod pipeline;
pub mod reporting;
pub mod services;
pub mod telemetry;
pub mod trace;
pub mod tracker;
pub mod webhook;

pub use budget::{TokenLedger, TokenUsage, HARD_BUDGET};
pub use command::Command;
pub use dispatch::{Dispatcher, Variant};
pub use domain::{AgentResult, CouncilError, Intent, Result, ResultStatus, SchemaError, TaskSpec};
pub use github::GitHubTracker;
pub use meeting::{
    MeetingConfig, MeetingOrchestrator, MeetingReport, MeetingRequest, MeetingRole, RoleOutcome,
    RoleOutputs, SynthesisResult,
};
pub use memory::LocalMemoryStore;
pub use openai::OpenAiClient;
pub use pipeline::{
    AgentPipeline, CompletionPlanner, Planner, PipelineReport, SimulatedWorker, TemplatePlanner,
    Worker,
};
pub use services::{
    Completion, CompletionService, IssueRef, IssueStatus, IssueTracker, MeetingLogEntry,
    MemoryService, MemorySummary, PersistOutcome, ServiceError, ServiceResult, UnavailableCompletion,
};
pub use trace::{with_context, Origin, TraceContext};
pub use tracker::LocalTracker;
pub use webhook::{DeliveryOutcome, WebhookError};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
