//! Kvitto Core Library
//!
//! Shared functionality for the Kvitto receipt-to-expense tool:
//! - Database access and migrations (categories, payment methods, expenses)
//! - Pluggable AI backends for receipt extraction, classification and revision
//! - Model router for task-based model selection
//! - Prompt library for customizable AI prompts
//! - Persistence gateway over the local store or a remote Kvitto server
//! - The review workflow that turns a receipt image into a stored expense

pub mod ai;
pub mod db;
pub mod error;
pub mod gateway;
pub mod model_router;
pub mod models;
pub mod prompts;
pub mod reference;
pub mod seed;
pub mod workflow;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIBackend, AIClient, CategoryChoice, MockBackend, OllamaBackend, OpenAICompatibleBackend,
    ReceiptFields, RouterInfo,
};
pub use db::Database;
pub use error::{Error, Result};
pub use gateway::{ExpenseGateway, HttpGateway};
pub use model_router::{ModelRouter, RouterConfig, TaskConfig, TaskType};
pub use models::{BusinessOrPersonal, Category, Expense, ExpenseFilter, NewExpense, PaymentMethod};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use reference::{load_reference_data, ReferenceData};
pub use seed::{seed_reference_data, SeedConfig, SeedReport};
pub use workflow::{
    Decision, Outcome, RecoveryDecision, ResolutionIssue, Reviewer, ScriptedReviewer, Stage,
    WorkflowEngine, WorkflowOutcome, WorkflowState,
};
