//! Agent module for orchestrating phone automation.
//!
//! The decision units (Planner, Actor, Outcome-Evaluator, Memory-Writer)
//! read a shared [`SessionState`]; [`PhoneAgent`] threads it through the loop.

mod actor;
mod evaluator;
mod memory_writer;
mod phone_agent;
mod planner;
pub mod sections;
mod state;
mod unit;

pub use actor::{Actor, ActorDecision};
pub use evaluator::{Evaluation, OutcomeEvaluator};
pub use memory_writer::MemoryWriter;
pub use phone_agent::{AgentConfig, AgentError, PhoneAgent, TaskReport, TerminationReason};
pub use planner::{Planner, PlannerDecision};
pub use state::{
    is_done_subgoal, merge_notes, DispatchFailure, HistoryEntry, Outcome, SessionState,
    StepRecord, DEFAULT_ERR_TO_MANAGER_THRESH, DONE_SENTINEL, NO_ERROR,
};
pub use unit::{consult, DecisionUnit, ParseError, Role, UnitError};
