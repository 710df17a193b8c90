//! Interactive receipt processing
//!
//! Wires the workflow engine to the configured AI backend, a persistence
//! gateway (the local database or a remote server) and a console reviewer.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use kvitto_core::ai::{AIBackend, AIClient};
use kvitto_core::gateway::{ExpenseGateway, HttpGateway};
use kvitto_core::model_router::ModelRouter;
use kvitto_core::workflow::{
    Decision, Outcome, RecoveryDecision, Reviewer, Stage, WorkflowEngine, WorkflowOutcome,
    WorkflowState,
};

use super::open_db;

/// Reviewer that talks to the operator on stdin/stdout
///
/// Lines are read on a detached thread and handed over through a channel, so
/// an abandoned prompt never keeps the runtime from shutting down.
pub struct ConsoleReviewer {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl ConsoleReviewer {
    pub fn new() -> Self {
        Self::from_reader(BufReader::new(std::io::stdin()))
    }

    /// Read answers from any line source instead of stdin
    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            lines: Mutex::new(rx),
        }
    }

    async fn prompt(&self, question: &str) -> kvitto_core::Result<String> {
        print!("{}", question);
        std::io::stdout().flush()?;

        let mut lines = self.lines.lock().await;
        match lines.recv().await {
            Some(line) => Ok(line.trim().to_string()),
            None => Err(kvitto_core::Error::InvalidHumanInput(
                "standard input closed".to_string(),
            )),
        }
    }
}

impl Default for ConsoleReviewer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Reviewer for ConsoleReviewer {
    async fn ask_decision(&self, state: &WorkflowState) -> kvitto_core::Result<String> {
        println!();
        println!("📝 Draft expense (vision model: {})", state.vision_model);
        println!("{}", state.summary());
        self.prompt(&format!("{}\n> ", Decision::HELP)).await
    }

    async fn ask_instructions(&self, _state: &WorkflowState) -> kvitto_core::Result<String> {
        self.prompt("What should be changed?\n> ").await
    }

    async fn ask_recovery(
        &self,
        stage: Stage,
        error: &kvitto_core::Error,
    ) -> kvitto_core::Result<String> {
        println!();
        println!("❌ {} failed: {}", stage, error);
        self.prompt(&format!("{}\n> ", RecoveryDecision::HELP))
            .await
    }

    fn notify(&self, message: &str) {
        println!("⚠️  {}", message);
    }
}

pub async fn cmd_process(
    db_path: &Path,
    no_encrypt: bool,
    image: &Path,
    vision_model: Option<&str>,
    categorizer_model: Option<&str>,
    remote: Option<&str>,
) -> Result<()> {
    let backend = AIClient::from_env().ok_or_else(|| {
        anyhow!("No AI backend configured. Set OLLAMA_HOST (or AI_BACKEND=openai_compatible with OPENAI_COMPATIBLE_HOST)")
    })?;
    let router = Arc::new(ModelRouter::new().context("Failed to load model routing config")?);

    println!("🧾 Processing {}", image.display());
    if !backend.health_check().await {
        tracing::warn!("AI backend did not answer its health check; extraction will likely fail");
    }

    let remote = match remote {
        Some(url) => {
            let gateway = HttpGateway::new(url);
            Some(match std::env::var("KVITTO_API_KEY") {
                Ok(key) => gateway.with_api_key(&key),
                Err(_) => gateway,
            })
        }
        None => HttpGateway::from_env(),
    };

    let done = match remote {
        Some(gateway) => {
            println!("   Storing through {}", gateway.base_url());
            run_workflow(
                backend,
                gateway,
                router,
                image,
                vision_model,
                categorizer_model,
            )
            .await?
        }
        None => {
            let db = open_db(db_path, no_encrypt)?;
            run_workflow(backend, db, router, image, vision_model, categorizer_model).await?
        }
    };

    report(&done);
    Ok(())
}

async fn run_workflow<G: ExpenseGateway>(
    backend: AIClient,
    gateway: G,
    router: Arc<ModelRouter>,
    image: &Path,
    vision_model: Option<&str>,
    categorizer_model: Option<&str>,
) -> Result<WorkflowOutcome> {
    let mut engine = WorkflowEngine::new(backend, gateway, ConsoleReviewer::new(), router);
    Ok(engine
        .process_image(image, vision_model, categorizer_model)
        .await?)
}

fn report(done: &WorkflowOutcome) {
    println!();
    match &done.outcome {
        Outcome::Persisted(expense) => {
            println!("✅ Stored as expense #{}", expense.transaction_id);
            println!(
                "   {} {} {} (VAT {}) category #{} payment method #{}",
                expense.date,
                expense.description,
                expense.amount,
                expense.vat,
                expense.category_id,
                expense.payment_method_id
            );
        }
        Outcome::Abandoned { reason } => {
            println!("🚫 Nothing stored: {}", reason);
        }
    }
    tracing::debug!(stages = ?done.history, "Workflow finished");
}
