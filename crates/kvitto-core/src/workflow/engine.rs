//! The workflow engine: drives one receipt from image to stored expense

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::ai::AIBackend;
use crate::error::{Error, Result};
use crate::gateway::ExpenseGateway;
use crate::model_router::{ModelRouter, TaskType};
use crate::models::Expense;
use crate::reference::load_reference_data;

use super::nodes;
use super::review::{RecoveryDecision, Reviewer};
use super::state::{Decision, Draft, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extracting,
    Classifying,
    Reviewing,
    Revising,
    Persisting,
    /// A node failed; waiting for the operator to choose how to continue
    Recovering,
    Persisted,
    Abandoned,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extracting => "extracting",
            Stage::Classifying => "classifying",
            Stage::Reviewing => "reviewing",
            Stage::Revising => "revising",
            Stage::Persisting => "persisting",
            Stage::Recovering => "recovering",
            Stage::Persisted => "persisted",
            Stage::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Persisted | Stage::Abandoned)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a review decision leads
pub fn next_stage(decision: Option<&Decision>) -> Stage {
    match decision {
        Some(Decision::Accept) => Stage::Persisting,
        Some(Decision::ChangeModel(_)) => Stage::Extracting,
        Some(Decision::Revise) => Stage::Revising,
        Some(Decision::Abandon) => Stage::Abandoned,
        None => Stage::Reviewing,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Persisted(Expense),
    Abandoned { reason: String },
}

/// How a workflow ended
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub outcome: Outcome,
    /// The final state; after an abandon it still carries the draft
    pub state: WorkflowState,
    /// Every stage entered, in order
    pub history: Vec<Stage>,
}

impl WorkflowOutcome {
    pub fn expense(&self) -> Option<&Expense> {
        match &self.outcome {
            Outcome::Persisted(expense) => Some(expense),
            Outcome::Abandoned { .. } => None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.expense().is_some()
    }
}

/// Runs receipts through extract, classify, review, revise and persist
///
/// One engine may process many receipts in sequence. It remembers the
/// fingerprint of every record it has stored, together with its source
/// image, and will not store the same receipt twice.
pub struct WorkflowEngine<B, G, R> {
    backend: B,
    gateway: G,
    reviewer: R,
    router: Arc<ModelRouter>,
    review_timeout: Option<Duration>,
    submitted: HashMap<String, i64>,
}

impl<B, G, R> WorkflowEngine<B, G, R>
where
    B: AIBackend,
    G: ExpenseGateway,
    R: Reviewer,
{
    pub fn new(backend: B, gateway: G, reviewer: R, router: Arc<ModelRouter>) -> Self {
        let review_timeout = router.review_timeout();
        Self {
            backend,
            gateway,
            reviewer,
            router,
            review_timeout,
            submitted: HashMap::new(),
        }
    }

    pub fn with_review_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.review_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn reviewer(&self) -> &R {
        &self.reviewer
    }

    /// Load reference data, read the image, and run the workflow
    ///
    /// Models default to the router's vision and classification models.
    /// Fails before any extraction if reference data cannot be loaded.
    pub async fn process_image(
        &mut self,
        image: &Path,
        vision_model: Option<&str>,
        categorizer_model: Option<&str>,
    ) -> Result<WorkflowOutcome> {
        let reference = load_reference_data(&self.gateway).await?;
        let bytes = tokio::fs::read(image).await?;

        let vision = vision_model
            .unwrap_or_else(|| self.router.model_for_task(TaskType::Vision))
            .to_string();
        let categorizer = categorizer_model
            .unwrap_or_else(|| self.router.model_for_task(TaskType::Classification))
            .to_string();

        let state = WorkflowState::new(
            reference,
            &image.display().to_string(),
            &bytes,
            &vision,
            &categorizer,
        );
        self.run(state).await
    }

    /// Run a prepared state from extraction to a terminal stage
    pub async fn run(&mut self, initial: WorkflowState) -> Result<WorkflowOutcome> {
        let mut state = initial;
        let mut stage = Stage::Extracting;
        let mut history = Vec::new();
        let mut failure: Option<(Stage, Error)> = None;
        let mut finished: Option<Outcome> = None;

        info!(image = %state.image_location, model = %state.vision_model, "Starting workflow");

        loop {
            history.push(stage);
            debug!(%stage, "Entering stage");

            stage = match stage {
                Stage::Extracting => match nodes::extract(&self.backend, &state).await {
                    Ok(next) => {
                        state = next;
                        Stage::Classifying
                    }
                    Err(e) => record_failure(&mut failure, Stage::Extracting, e),
                },

                Stage::Classifying => match nodes::classify(&self.backend, &state).await {
                    Ok(next) => {
                        state = next;
                        Stage::Reviewing
                    }
                    Err(e) => record_failure(&mut failure, Stage::Classifying, e),
                },

                Stage::Reviewing => {
                    match self.bounded(nodes::review(&self.reviewer, &state)).await {
                        Ok(next) => {
                            state = next;
                            match state.decision.clone() {
                                Some(Decision::ChangeModel(requested)) => {
                                    match self.pick_vision_model(&state.vision_model, requested) {
                                        Some(model) => {
                                            info!(from = %state.vision_model, to = %model, "Changing vision model");
                                            state = state.with_vision_model(&model);
                                            Stage::Extracting
                                        }
                                        None => {
                                            self.reviewer
                                                .notify("No other vision model is configured");
                                            state = state.with_decision(None);
                                            Stage::Reviewing
                                        }
                                    }
                                }
                                Some(Decision::Abandon) => {
                                    finished = Some(Outcome::Abandoned {
                                        reason: "abandoned by reviewer".into(),
                                    });
                                    Stage::Abandoned
                                }
                                decision => next_stage(decision.as_ref()),
                            }
                        }
                        Err(reason) => {
                            finished = Some(Outcome::Abandoned { reason });
                            Stage::Abandoned
                        }
                    }
                }

                Stage::Revising => {
                    match self.bounded(self.reviewer.ask_instructions(&state)).await {
                        Ok(instructions) if instructions.trim().is_empty() => {
                            self.reviewer.notify("No instructions given; draft unchanged");
                            state = state.with_decision(None);
                            Stage::Reviewing
                        }
                        Ok(instructions) => {
                            match nodes::revise(&self.backend, &state, instructions.trim()).await {
                                Ok(next) => {
                                    state = next;
                                    Stage::Reviewing
                                }
                                Err(e) => record_failure(&mut failure, Stage::Revising, e),
                            }
                        }
                        Err(reason) => {
                            finished = Some(Outcome::Abandoned { reason });
                            Stage::Abandoned
                        }
                    }
                }

                Stage::Persisting => {
                    let record = match state.draft.finalize() {
                        Ok(record) => record,
                        Err(e) => {
                            self.reviewer.notify(&e.to_string());
                            state = state.with_decision(None);
                            stage = Stage::Reviewing;
                            continue;
                        }
                    };

                    let key = nodes::fingerprint(&record, &state.image_encoded)?;
                    if let Some(id) = self.submitted.get(&key) {
                        warn!(transaction_id = id, "Refusing to store a duplicate expense");
                        finished = Some(Outcome::Abandoned {
                            reason: format!("already stored as transaction {}", id),
                        });
                        Stage::Abandoned
                    } else {
                        match nodes::persist(&self.gateway, &record).await {
                            Ok(expense) => {
                                info!(transaction_id = expense.transaction_id, "Stored expense");
                                self.submitted.insert(key, expense.transaction_id);
                                finished = Some(Outcome::Persisted(expense));
                                Stage::Persisted
                            }
                            Err(e) => record_failure(&mut failure, Stage::Persisting, e),
                        }
                    }
                }

                Stage::Recovering => {
                    let Some((failed, error)) = failure.take() else {
                        stage = Stage::Reviewing;
                        continue;
                    };

                    let answer = match self
                        .bounded(self.reviewer.ask_recovery(failed, &error))
                        .await
                    {
                        Ok(answer) => answer,
                        Err(reason) => {
                            finished = Some(Outcome::Abandoned {
                                reason: format!("{} failed ({}); {}", failed, error, reason),
                            });
                            stage = Stage::Abandoned;
                            continue;
                        }
                    };

                    match answer.parse::<RecoveryDecision>() {
                        Ok(RecoveryDecision::Retry) => failed,
                        Ok(RecoveryDecision::ChangeModel(requested)) => {
                            match self.pick_vision_model(&state.vision_model, requested) {
                                Some(model) => {
                                    info!(from = %state.vision_model, to = %model, "Changing vision model");
                                    state = state.with_vision_model(&model);
                                    Stage::Extracting
                                }
                                None => {
                                    self.reviewer.notify("No other vision model is configured");
                                    failure = Some((failed, error));
                                    Stage::Recovering
                                }
                            }
                        }
                        Ok(RecoveryDecision::Revise) if state.draft == Draft::default() => {
                            self.reviewer.notify("There is no draft to revise yet");
                            failure = Some((failed, error));
                            Stage::Recovering
                        }
                        Ok(RecoveryDecision::Revise) => Stage::Revising,
                        Ok(RecoveryDecision::Abandon) => {
                            finished = Some(Outcome::Abandoned {
                                reason: format!("{} failed: {}", failed, error),
                            });
                            Stage::Abandoned
                        }
                        Err(e) => {
                            self.reviewer.notify(&e.to_string());
                            failure = Some((failed, error));
                            Stage::Recovering
                        }
                    }
                }

                Stage::Persisted | Stage::Abandoned => {
                    let outcome = finished.take().unwrap_or_else(|| Outcome::Abandoned {
                        reason: "workflow ended without an outcome".into(),
                    });
                    if let Outcome::Abandoned { reason } = &outcome {
                        info!(%reason, "Workflow abandoned");
                    }
                    return Ok(WorkflowOutcome {
                        outcome,
                        state,
                        history,
                    });
                }
            };
        }
    }

    /// Await a reviewer call under the review timeout
    ///
    /// The error is the reason to abandon: a timeout or a reviewer failure.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T>>,
    ) -> std::result::Result<T, String> {
        let result = match self.review_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs_f64(), "Review timed out");
                    return Err(format!(
                        "no reviewer response within {:.0?}",
                        limit
                    ));
                }
            },
            None => call.await,
        };
        result.map_err(|e| format!("reviewer unavailable: {}", e))
    }

    /// The model a change-model request switches to, if any differs from `current`
    fn pick_vision_model(&self, current: &str, requested: Option<String>) -> Option<String> {
        match requested {
            Some(model) if model != current => Some(model),
            Some(_) => None,
            None => self.router.next_vision_model(current).map(String::from),
        }
    }
}

fn record_failure(slot: &mut Option<(Stage, Error)>, stage: Stage, error: Error) -> Stage {
    warn!(%stage, error = %error, recoverable = error.is_recoverable(), "Stage failed");
    *slot = Some((stage, error));
    Stage::Recovering
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::*;
    use crate::ai::{MockBackend, MockCall, ReceiptFields};
    use crate::db::Database;
    use crate::model_router::RouterConfig;
    use crate::models::{Category, NewExpense, PaymentMethod};
    use crate::workflow::review::ScriptedReviewer;

    fn seeded_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.create_category("Travel").unwrap();
        db.create_category("Meals").unwrap();
        db.create_category("Office Supplies").unwrap();
        db.create_payment_method("Visa").unwrap();
        db.create_payment_method("Cash").unwrap();
        db
    }

    fn router() -> Arc<ModelRouter> {
        Arc::new(ModelRouter::with_config(RouterConfig {
            vision_alternates: vec!["vision-a".into(), "vision-b".into()],
            ..RouterConfig::default()
        }))
    }

    async fn initial_state(db: &Database) -> WorkflowState {
        let reference = load_reference_data(db).await.unwrap();
        WorkflowState::new(reference, "receipt.jpg", b"jpeg-bytes", "vision-a", "text-a")
    }

    /// Fails the first `failures` stores, then delegates
    struct FlakyGateway {
        db: Database,
        failures: AtomicUsize,
        stores: AtomicUsize,
    }

    #[async_trait]
    impl ExpenseGateway for FlakyGateway {
        async fn list_categories(&self) -> Result<Vec<Category>> {
            self.db.list_categories()
        }

        async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
            self.db.list_payment_methods()
        }

        async fn create_expense(&self, expense: &NewExpense) -> Result<Expense> {
            self.stores.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::PersistenceFailed("connection reset".into()));
            }
            self.db.create_expense(expense)
        }

        async fn get_expense(&self, transaction_id: i64) -> Result<Option<Expense>> {
            self.db.get_expense(transaction_id)
        }
    }

    #[test]
    fn test_next_stage() {
        assert_eq!(next_stage(Some(&Decision::Accept)), Stage::Persisting);
        assert_eq!(next_stage(Some(&Decision::Revise)), Stage::Revising);
        assert_eq!(next_stage(Some(&Decision::Abandon)), Stage::Abandoned);
        assert_eq!(
            next_stage(Some(&Decision::ChangeModel(None))),
            Stage::Extracting
        );
        assert_eq!(next_stage(None), Stage::Reviewing);
        assert!(Stage::Persisted.is_terminal());
        assert!(!Stage::Recovering.is_terminal());
    }

    #[tokio::test]
    async fn test_accept_persists_once() {
        let db = seeded_db();
        let mock = MockBackend::new();
        let reviewer = ScriptedReviewer::new(["a"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock.clone(), db.clone(), reviewer, router());

        let done = engine.run(state).await.unwrap();

        assert_eq!(
            done.history,
            vec![
                Stage::Extracting,
                Stage::Classifying,
                Stage::Reviewing,
                Stage::Persisting,
                Stage::Persisted
            ]
        );
        let expense = done.expense().unwrap();
        assert_eq!(expense.category_id, 3);
        assert_eq!(expense.payment_method_id, 1);
        assert_eq!(expense.amount, Decimal::new(4250, 2));
        assert_eq!(db.list_expenses(&Default::default()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unrecognised_input_stays_in_review() {
        let db = seeded_db();
        let reviewer = ScriptedReviewer::new(["maybe", "q"]);
        let state = initial_state(&db).await;
        let mut engine =
            WorkflowEngine::new(MockBackend::new(), db.clone(), reviewer.clone(), router());

        let done = engine.run(state).await.unwrap();

        assert_eq!(
            &done.history[2..],
            &[Stage::Reviewing, Stage::Reviewing, Stage::Abandoned]
        );
        assert_eq!(
            done.outcome,
            Outcome::Abandoned {
                reason: "abandoned by reviewer".into()
            }
        );
        assert_eq!(reviewer.notices().len(), 1);
        assert!(db.list_expenses(&Default::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_payment_method_needs_revision() {
        let db = seeded_db();
        let mock = MockBackend::new();
        mock.push_extraction(ReceiptFields {
            payment_method: Some("Bitcoin".into()),
            ..MockBackend::default_receipt()
        })
        .push_revision(ReceiptFields {
            payment_method: Some("Cash".into()),
            ..Default::default()
        });
        let reviewer = ScriptedReviewer::new(["a", "r", "it was paid in cash", "a"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock.clone(), db, reviewer.clone(), router());

        let done = engine.run(state).await.unwrap();

        assert!(reviewer.shown()[0].contains("unknown payment method 'Bitcoin'"));
        assert!(reviewer.notices()[0].contains("Cannot accept"));
        assert!(done.history.contains(&Stage::Revising));
        assert_eq!(done.expense().unwrap().payment_method_id, 2);
        assert!(mock.calls().contains(&MockCall::Revise {
            model: None,
            instructions: "it was paid in cash".into()
        }));
    }

    #[tokio::test]
    async fn test_change_model_reextracts_same_image() {
        let db = seeded_db();
        let mock = MockBackend::new();
        let reviewer = ScriptedReviewer::new(["m", "a"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock.clone(), db, reviewer, router());

        let done = engine.run(state).await.unwrap();

        let extractions: Vec<MockCall> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::Extract { .. }))
            .collect();
        assert_eq!(extractions.len(), 2);
        let (
            MockCall::Extract {
                model: first,
                image_base64: a,
            },
            MockCall::Extract {
                model: second,
                image_base64: b,
            },
        ) = (&extractions[0], &extractions[1])
        else {
            panic!("expected two extractions");
        };
        assert_eq!(first.as_deref(), Some("vision-a"));
        assert_eq!(second.as_deref(), Some("vision-b"));
        assert_eq!(a, b);
        assert_eq!(done.state.vision_model, "vision-b");
        assert!(done.is_persisted());
    }

    #[tokio::test]
    async fn test_change_model_to_named_model() {
        let db = seeded_db();
        let mock = MockBackend::new();
        let reviewer = ScriptedReviewer::new(["m llava:13b", "q"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock, db, reviewer, router());

        let done = engine.run(state).await.unwrap();
        assert_eq!(done.state.vision_model, "llava:13b");
        assert_eq!(
            done.history.iter().filter(|s| **s == Stage::Extracting).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_extraction_failure_then_retry() {
        let db = seeded_db();
        let mock = MockBackend::new();
        mock.push_extraction_error("model returned prose");
        let reviewer = ScriptedReviewer::new(["retry", "a"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock, db, reviewer.clone(), router());

        let done = engine.run(state).await.unwrap();

        assert_eq!(
            &done.history[..3],
            &[Stage::Extracting, Stage::Recovering, Stage::Extracting]
        );
        assert!(done.is_persisted());
        assert!(reviewer.notices()[0].contains("extracting failed"));
    }

    #[tokio::test]
    async fn test_classification_failure_then_retry() {
        let db = seeded_db();
        let mock = MockBackend::new();
        mock.push_classification_error("connection refused");
        let reviewer = ScriptedReviewer::new(["t", "a"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock.clone(), db, reviewer.clone(), router());

        let done = engine.run(state).await.unwrap();

        assert_eq!(
            done.history,
            vec![
                Stage::Extracting,
                Stage::Classifying,
                Stage::Recovering,
                Stage::Classifying,
                Stage::Reviewing,
                Stage::Persisting,
                Stage::Persisted
            ]
        );
        assert!(reviewer.notices()[0].starts_with("classifying failed"));
        let extractions = mock
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Extract { .. }))
            .count();
        assert_eq!(extractions, 1);
        assert_eq!(done.expense().unwrap().category_id, 3);
    }

    #[tokio::test]
    async fn test_revise_without_draft_is_refused() {
        let db = seeded_db();
        let mock = MockBackend::new();
        mock.push_extraction_error("model returned prose");
        let reviewer = ScriptedReviewer::new(["r", "q"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock.clone(), db, reviewer.clone(), router());

        let done = engine.run(state).await.unwrap();

        assert_eq!(
            done.history,
            vec![
                Stage::Extracting,
                Stage::Recovering,
                Stage::Recovering,
                Stage::Abandoned
            ]
        );
        assert_eq!(reviewer.notices()[1], "There is no draft to revise yet");
        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::Revise { .. })));
    }

    #[tokio::test]
    async fn test_empty_instructions_return_to_review() {
        let db = seeded_db();
        let mock = MockBackend::new();
        let reviewer = ScriptedReviewer::new(["r", "   ", "a"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock.clone(), db, reviewer.clone(), router());

        let done = engine.run(state).await.unwrap();

        assert_eq!(
            &done.history[2..],
            &[
                Stage::Reviewing,
                Stage::Revising,
                Stage::Reviewing,
                Stage::Persisting,
                Stage::Persisted
            ]
        );
        assert_eq!(reviewer.notices(), vec!["No instructions given; draft unchanged"]);
        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::Revise { .. })));
    }

    #[tokio::test]
    async fn test_persistence_retry_skips_earlier_stages() {
        let db = seeded_db();
        let gateway = FlakyGateway {
            db: db.clone(),
            failures: AtomicUsize::new(1),
            stores: AtomicUsize::new(0),
        };
        let mock = MockBackend::new();
        let reviewer = ScriptedReviewer::new(["a", "t"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(mock.clone(), gateway, reviewer, router());

        let done = engine.run(state).await.unwrap();

        assert!(done.is_persisted());
        assert_eq!(engine.gateway().stores.load(Ordering::SeqCst), 2);
        let classifications = mock
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Classify { .. }))
            .count();
        assert_eq!(classifications, 1);
    }

    #[tokio::test]
    async fn test_abandon_after_persistence_failure_keeps_draft() {
        let db = seeded_db();
        let gateway = FlakyGateway {
            db: db.clone(),
            failures: AtomicUsize::new(5),
            stores: AtomicUsize::new(0),
        };
        let reviewer = ScriptedReviewer::new(["a", "q"]);
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(MockBackend::new(), gateway, reviewer, router());

        let done = engine.run(state).await.unwrap();

        match &done.outcome {
            Outcome::Abandoned { reason } => assert!(reason.contains("connection reset")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(done.state.draft.amount, Some(Decimal::new(4250, 2)));
        assert_eq!(done.state.draft.category_id, Some(3));
    }

    #[tokio::test]
    async fn test_same_record_is_not_stored_twice() {
        let db = seeded_db();
        let reviewer = ScriptedReviewer::new(["a", "a"]);
        let mut engine = WorkflowEngine::new(MockBackend::new(), db.clone(), reviewer, router());

        let first = engine.run(initial_state(&db).await).await.unwrap();
        let second = engine.run(initial_state(&db).await).await.unwrap();

        let id = first.expense().unwrap().transaction_id;
        assert_eq!(
            second.outcome,
            Outcome::Abandoned {
                reason: format!("already stored as transaction {}", id)
            }
        );
        assert_eq!(db.list_expenses(&Default::default()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_identical_fields_from_another_receipt_are_stored() {
        let db = seeded_db();
        let reviewer = ScriptedReviewer::new(["a", "a"]);
        let mut engine = WorkflowEngine::new(MockBackend::new(), db.clone(), reviewer, router());
        let reference = load_reference_data(&db).await.unwrap();

        let first = WorkflowState::new(
            reference.clone(),
            "one.jpg",
            b"image-one",
            "vision-a",
            "text-a",
        );
        let second = WorkflowState::new(reference, "two.jpg", b"image-two", "vision-a", "text-a");
        let first = engine.run(first).await.unwrap();
        let second = engine.run(second).await.unwrap();

        assert!(first.is_persisted());
        assert!(second.is_persisted());
        assert_ne!(
            first.expense().unwrap().transaction_id,
            second.expense().unwrap().transaction_id
        );
        assert_eq!(db.list_expenses(&Default::default()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_review_timeout_abandons() {
        let db = seeded_db();
        let state = initial_state(&db).await;
        let mut engine = WorkflowEngine::new(
            MockBackend::new(),
            db,
            ScriptedReviewer::stalled(),
            router(),
        )
        .with_review_timeout(Some(Duration::from_millis(20)));

        let done = engine.run(state).await.unwrap();

        assert_eq!(done.history.last(), Some(&Stage::Abandoned));
        match done.outcome {
            Outcome::Abandoned { reason } => assert!(reason.contains("no reviewer response")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_reference_data_stops_before_extraction() {
        let db = Database::in_memory().unwrap();
        let mock = MockBackend::new();
        let mut engine =
            WorkflowEngine::new(mock.clone(), db, ScriptedReviewer::new(["a"]), router());
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("receipt.jpg");
        std::fs::write(&image, b"jpeg").unwrap();

        let err = engine.process_image(&image, None, None).await.unwrap_err();
        assert!(matches!(err, Error::ReferenceDataUnavailable(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_process_image_uses_routed_models() {
        let db = seeded_db();
        let mock = MockBackend::new();
        let mut engine =
            WorkflowEngine::new(mock.clone(), db, ScriptedReviewer::new(["a"]), router());
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("receipt.jpg");
        std::fs::write(&image, b"hello").unwrap();

        let done = engine.process_image(&image, None, Some("text-b")).await.unwrap();

        assert!(done.is_persisted());
        assert_eq!(
            mock.calls()[0],
            MockCall::Extract {
                model: Some("llama3.2".into()),
                image_base64: "aGVsbG8=".into()
            }
        );
        assert_eq!(
            mock.calls()[1],
            MockCall::Classify {
                model: Some("text-b".into()),
                categories: vec!["Travel".into(), "Meals".into(), "Office Supplies".into()]
            }
        );
    }
}
