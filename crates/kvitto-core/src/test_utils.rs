//! Test utilities for kvitto-core
//!
//! A mock Ollama server that answers the three workflow prompts, for
//! integration tests and for trying the CLI without a model server.
//!
//! Receipt "images" are plain text in tests. The extraction answer depends
//! on what the image says:
//! - contains `bitcoin`: paid with "Bitcoin"
//! - contains `blurry`: unreadable (non-JSON answer) unless the model is a llava model
//! - otherwise: the printer-paper receipt

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Json, State},
    routing::{get, post},
    Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;

/// Which prompt a generate request carried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockPromptKind {
    Extract,
    Classify,
    Revise,
    Unknown,
}

/// A generate request seen by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub model: String,
    pub kind: MockPromptKind,
    pub image_count: usize,
}

type Log = Arc<Mutex<Vec<RecordedRequest>>>;

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    log: Log,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let log: Log = Arc::default();
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(log.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            log,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Generate requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(default)]
    images: Vec<String>,
}

#[derive(Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

#[derive(Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Serialize)]
struct ModelInfo {
    name: String,
    modified_at: String,
    size: u64,
}

/// Ollama tags endpoint response (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: vec![ModelInfo {
            name: "llama3.2-vision:11b".to_string(),
            modified_at: "2024-01-01T00:00:00Z".to_string(),
            size: 7_900_000_000,
        }],
    })
}

/// Ollama generate endpoint
async fn handle_generate(
    State(log): State<Log>,
    Json(request): Json<GenerateRequest>,
) -> Json<GenerateResponse> {
    // These patterns match the prompt files in prompts/*.md
    let kind = if request.prompt.contains("Extract the receipt") {
        MockPromptKind::Extract
    } else if request.prompt.contains("Select the category") {
        MockPromptKind::Classify
    } else if request.prompt.contains("Apply the reviewer's instructions") {
        MockPromptKind::Revise
    } else {
        MockPromptKind::Unknown
    };

    log.lock().unwrap().push(RecordedRequest {
        model: request.model.clone(),
        kind,
        image_count: request.images.len(),
    });

    let response = match kind {
        MockPromptKind::Extract => extract_mock(&request),
        MockPromptKind::Classify => classify_mock(&request.prompt),
        MockPromptKind::Revise => revise_mock(&request.prompt),
        MockPromptKind::Unknown => "I am not sure what you are asking.".to_string(),
    };

    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
}

fn extract_mock(request: &GenerateRequest) -> String {
    let image = request
        .images
        .first()
        .and_then(|b64| base64::engine::general_purpose::STANDARD.decode(b64).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).to_lowercase())
        .unwrap_or_default();

    if image.contains("blurry") && !request.model.contains("llava") {
        return "The image is too blurry to read.".to_string();
    }

    let payment_method = if image.contains("bitcoin") {
        "Bitcoin"
    } else {
        "Visa"
    };

    json!({
        "date": "2024-03-01",
        "description": "Printer paper and toner",
        "amount": 42.50,
        "vat": 5.00,
        "business_personal": "business",
        "payment_method": payment_method,
    })
    .to_string()
}

fn classify_mock(prompt: &str) -> String {
    let categories = prompt
        .split("from the following list:")
        .nth(1)
        .and_then(|rest| rest.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or_default();

    // Answer in lowercase so callers exercise canonicalization
    let category = categories
        .split(", ")
        .find(|c| c.eq_ignore_ascii_case("Office Supplies"))
        .or_else(|| categories.split(", ").next())
        .unwrap_or("Other")
        .to_lowercase();

    format!("Here you go: {}", json!({ "category": category }))
}

fn revise_mock(prompt: &str) -> String {
    let field = |key: &str| -> Option<String> {
        let prefix = format!("- {} = ", key);
        prompt
            .lines()
            .find_map(|line| line.strip_prefix(&prefix))
            .filter(|v| *v != "unknown")
            .map(str::to_string)
    };

    let instructions = prompt
        .split("keep every other field unchanged:")
        .nth(1)
        .and_then(|rest| rest.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or_default()
        .to_lowercase();

    let payment_methods = prompt
        .lines()
        .find_map(|line| line.strip_prefix("If the payment method changes, choose it from this list: "))
        .unwrap_or_default();
    let payment_method = payment_methods
        .split(", ")
        .find(|m| instructions.contains(&m.to_lowercase()))
        .map(str::to_string)
        .or_else(|| field("payment_method"));

    json!({
        "date": field("date"),
        "description": field("description"),
        "amount": field("amount"),
        "vat": field("vat"),
        "business_personal": field("business_personal"),
        "payment_method": payment_method,
        "category": field("category"),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_mock_reads_category_list() {
        let prompt = "Select the category best suited for this receipt from the following list:\nTravel, Office Supplies\n";
        assert!(classify_mock(prompt).contains(r#""category":"office supplies""#));

        let prompt = "Select the category best suited for this receipt from the following list:\nTravel, Meals\n";
        assert!(classify_mock(prompt).contains(r#""category":"travel""#));
    }

    #[test]
    fn test_revise_mock_applies_payment_method() {
        let prompt = "- date = 2024-03-01\n- amount = 42.50\n- payment_method = Bitcoin\n\
                      Apply the reviewer's instructions below and keep every other field unchanged:\n\
                      It was paid in cash\n\
                      If the payment method changes, choose it from this list: Visa, Cash\n";
        let answer: serde_json::Value = serde_json::from_str(&revise_mock(prompt)).unwrap();
        assert_eq!(answer["payment_method"], "Cash");
        assert_eq!(answer["amount"], "42.50");
        assert!(answer["vat"].is_null());
    }
}
