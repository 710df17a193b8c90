//! The human side of the workflow
//!
//! A `Reviewer` is asked for raw text; parsing into decisions happens in the
//! workflow so every front end accepts the same tokens.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::engine::Stage;
use super::state::WorkflowState;

#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Show the draft and its issues, return the operator's answer
    async fn ask_decision(&self, state: &WorkflowState) -> Result<String>;

    /// Collect free-text correction instructions
    async fn ask_instructions(&self, state: &WorkflowState) -> Result<String>;

    /// Report a failed stage and ask how to continue
    async fn ask_recovery(&self, stage: Stage, error: &Error) -> Result<String>;

    /// Tell the operator something without expecting an answer
    fn notify(&self, message: &str);
}

/// How to continue after a failed stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryDecision {
    Retry,
    ChangeModel(Option<String>),
    Revise,
    Abandon,
}

impl RecoveryDecision {
    pub const HELP: &'static str =
        "t (retry), m [model] (change model), r (revise), q (abandon)";
}

impl std::str::FromStr for RecoveryDecision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let token = parts.next().unwrap_or_default().to_lowercase();
        let rest: Vec<&str> = parts.collect();

        match (token.as_str(), rest.as_slice()) {
            ("t" | "retry", []) => Ok(Self::Retry),
            ("m" | "change_model" | "change-model", []) => Ok(Self::ChangeModel(None)),
            ("m" | "change_model" | "change-model", [model]) => {
                Ok(Self::ChangeModel(Some((*model).to_string())))
            }
            ("r" | "revise", []) => Ok(Self::Revise),
            ("q" | "abandon" | "quit", []) => Ok(Self::Abandon),
            _ => Err(Error::InvalidHumanInput(format!(
                "'{}' is not one of: {}",
                s.trim(),
                Self::HELP
            ))),
        }
    }
}

#[derive(Default)]
struct Transcript {
    answers: VecDeque<String>,
    notices: Vec<String>,
    /// Draft summaries shown at each decision prompt
    shown: Vec<String>,
}

/// Reviewer that replays canned answers, for tests and batch runs
///
/// Every question, whatever its kind, takes the next answer. Running out of
/// answers is an error, which the engine treats as the reviewer going away.
#[derive(Clone, Default)]
pub struct ScriptedReviewer {
    transcript: Arc<Mutex<Transcript>>,
    stalled: bool,
}

impl ScriptedReviewer {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reviewer = Self::default();
        reviewer.with_transcript(|t| t.answers.extend(answers.into_iter().map(Into::into)));
        reviewer
    }

    /// A reviewer that never answers
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::default()
        }
    }

    pub fn notices(&self) -> Vec<String> {
        self.with_transcript(|t| t.notices.clone())
    }

    pub fn shown(&self) -> Vec<String> {
        self.with_transcript(|t| t.shown.clone())
    }

    pub fn remaining(&self) -> usize {
        self.with_transcript(|t| t.answers.len())
    }

    async fn next_answer(&self) -> Result<String> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.with_transcript(|t| t.answers.pop_front())
            .ok_or_else(|| Error::InvalidHumanInput("no scripted answers left".into()))
    }

    fn with_transcript<T>(&self, f: impl FnOnce(&mut Transcript) -> T) -> T {
        let mut guard = self
            .transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn ask_decision(&self, state: &WorkflowState) -> Result<String> {
        let summary = state.summary();
        self.with_transcript(|t| t.shown.push(summary));
        self.next_answer().await
    }

    async fn ask_instructions(&self, _state: &WorkflowState) -> Result<String> {
        self.next_answer().await
    }

    async fn ask_recovery(&self, stage: Stage, error: &Error) -> Result<String> {
        let message = format!("{} failed: {}", stage, error);
        self.with_transcript(|t| t.notices.push(message));
        self.next_answer().await
    }

    fn notify(&self, message: &str) {
        let message = message.to_string();
        self.with_transcript(|t| t.notices.push(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_tokens() {
        assert_eq!("t".parse::<RecoveryDecision>().unwrap(), RecoveryDecision::Retry);
        assert_eq!(
            "retry".parse::<RecoveryDecision>().unwrap(),
            RecoveryDecision::Retry
        );
        assert_eq!(
            "m minicpm-v".parse::<RecoveryDecision>().unwrap(),
            RecoveryDecision::ChangeModel(Some("minicpm-v".into()))
        );
        assert_eq!(
            "Q".parse::<RecoveryDecision>().unwrap(),
            RecoveryDecision::Abandon
        );
        assert!(matches!(
            "a".parse::<RecoveryDecision>(),
            Err(Error::InvalidHumanInput(_))
        ));
    }

    #[tokio::test]
    async fn test_scripted_reviewer_runs_out() {
        let reviewer = ScriptedReviewer::new(["first"]);
        let err = Error::ExtractionFailed("boom".into());
        assert_eq!(
            reviewer.ask_recovery(Stage::Extracting, &err).await.unwrap(),
            "first"
        );
        assert!(reviewer.ask_recovery(Stage::Extracting, &err).await.is_err());
        assert_eq!(reviewer.remaining(), 0);
        assert!(reviewer.notices()[0].contains("boom"));
    }
}
