//! Sequential six-role meeting.
//!
//! # Module layout
//!
//! - [`roles`]: `MeetingRole`, system prompts, output caps
//! - [`outputs`]: `RoleOutcome`, `RoleOutputs`
//! - [`prompt`]: `MeetingRequest` and prompt assembly
//! - [`step`]: `StepExecutor`, `RoleStepReport`
//! - [`synthesis`]: `parse_sections`, `run_synthesis`, `SynthesisResult`
//! - [`orchestrator`]: `MeetingOrchestrator`, `MeetingConfig`, `MeetingReport`

pub mod orchestrator;
pub mod outputs;
pub mod prompt;
pub mod roles;
pub mod step;
pub mod synthesis;

pub use orchestrator::{MeetingConfig, MeetingOrchestrator, MeetingReport, RunPhase};
pub use outputs::{RoleOutcome, RoleOutputs};
pub use prompt::MeetingRequest;
pub use roles::MeetingRole;
pub use step::{RoleStepReport, StepExecutor};
pub use synthesis::{parse_sections, SectionParseError, SynthesisOutcome, SynthesisResult};
