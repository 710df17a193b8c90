//! Receipt-to-expense workflow
//!
//! A receipt moves through `Extracting -> Classifying -> Reviewing`, then on
//! the reviewer's word to `Persisting`, `Revising` (and back to review),
//! `Extracting` with another vision model, or `Abandoned`. Failed stages go
//! to `Recovering`, where the reviewer picks how to continue.

mod engine;
pub mod nodes;
mod review;
mod state;

pub use engine::{next_stage, Outcome, Stage, WorkflowEngine, WorkflowOutcome};
pub use review::{RecoveryDecision, Reviewer, ScriptedReviewer};
pub use state::{Decision, Draft, ResolutionIssue, WorkflowState};
