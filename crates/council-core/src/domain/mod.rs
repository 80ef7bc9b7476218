//! Domain models for the engine.
//!
//! - `TaskSpec`: planner output consumed by the worker and validator
//! - `AgentResult`: worker output, finalized by the validator
//! - `Intent` / `ResultStatus`: the closed enums both contracts share

pub mod error;
pub mod schemas;

pub use error::{CouncilError, Result, SchemaError};
pub use schemas::{AgentResult, Intent, ResultStatus, TaskSpec};
