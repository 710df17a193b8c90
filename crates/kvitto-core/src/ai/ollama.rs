//! Ollama backend implementation
//!
//! HTTP client for the Ollama `/api/generate` endpoint. Uses the model router
//! for task-based model selection and timeouts, and the prompt library for
//! customizable prompts.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::model_router::{ModelRouter, TaskType};
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::{parse_category_choice, parse_receipt_fields, parse_revision};
use super::types::{CategoryChoice, ReceiptFields, RevisionRequest, RouterInfo};
use super::{as_var_map, classification_vars, render_prompt, revision_vars, AIBackend};

/// Ollama backend with model router integration
///
/// # Configuration
///
/// Configure routing via `~/.local/share/kvitto/config/models.toml`:
///
/// ```toml
/// [defaults]
/// model = "llama3.2"
///
/// [models.vision]
/// model = "llama3.2-vision:11b"
/// timeout_secs = 120
/// ```
#[derive(Clone)]
pub struct OllamaBackend {
    http_client: Client,
    base_url: String,
    router: Arc<ModelRouter>,
    default_model: String,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OllamaBackend {
    pub fn new(base_url: &str, default_model: &str) -> Self {
        Self::with_router(base_url, default_model, ModelRouter::default())
    }

    /// Create a new instance with a different default model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            default_model: model.to_string(),
            ..self.clone()
        }
    }

    /// Create with a custom router
    pub fn with_router(base_url: &str, default_model: &str, router: ModelRouter) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            router: Arc::new(router),
            default_model: default_model.to_string(),
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Use a specific prompt library (tests use embedded-only prompts)
    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = Arc::new(RwLock::new(prompts));
        self
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2".to_string());
        Some(Self::new(&host, &model))
    }

    /// Model for a task: explicit override first, then the router
    fn resolve_model(&self, task: TaskType, explicit: Option<&str>) -> String {
        explicit
            .unwrap_or_else(|| self.router.model_for_task(task))
            .to_string()
    }

    /// Send one generate request and return the raw response text
    async fn generate(&self, task: TaskType, request: &OllamaRequest) -> Result<String> {
        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(self.router.timeout_for_task(task))
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let ollama_response: OllamaResponse = response.json().await?;
        debug!(
            task = task.as_str(),
            model = %request.model,
            "Ollama response: {}",
            ollama_response.response
        );

        Ok(ollama_response.response)
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Base64 images for vision models
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
    format: &'static str,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[async_trait]
impl AIBackend for OllamaBackend {
    async fn extract_receipt(
        &self,
        image_base64: &str,
        payment_methods: &[String],
        vision_model: Option<&str>,
    ) -> Result<ReceiptFields> {
        let methods = payment_methods.join(", ");
        let vars = [("payment_methods", methods)];
        let prompt = render_prompt(&self.prompts, PromptId::ExtractReceipt, &as_var_map(&vars))?;

        let request = OllamaRequest {
            model: self.resolve_model(TaskType::Vision, vision_model),
            prompt: prompt.user,
            system: prompt.system,
            images: vec![image_base64.to_string()],
            format: "json",
            stream: false,
        };

        let response = self.generate(TaskType::Vision, &request).await?;
        parse_receipt_fields(&response)
    }

    async fn classify_expense(
        &self,
        draft: &ReceiptFields,
        categories: &[String],
        model: Option<&str>,
    ) -> Result<CategoryChoice> {
        let vars = classification_vars(draft, categories);
        let prompt = render_prompt(&self.prompts, PromptId::ClassifyExpense, &as_var_map(&vars))?;

        let request = OllamaRequest {
            model: self.resolve_model(TaskType::Classification, model),
            prompt: prompt.user,
            system: prompt.system,
            images: Vec::new(),
            format: "json",
            stream: false,
        };

        let response = self.generate(TaskType::Classification, &request).await?;
        parse_category_choice(&response)
    }

    async fn revise_expense(
        &self,
        request: &RevisionRequest<'_>,
        model: Option<&str>,
    ) -> Result<ReceiptFields> {
        let vars = revision_vars(request);
        let prompt = render_prompt(&self.prompts, PromptId::ReviseExpense, &as_var_map(&vars))?;

        let request = OllamaRequest {
            model: self.resolve_model(TaskType::Revision, model),
            prompt: prompt.user,
            system: prompt.system,
            images: Vec::new(),
            format: "json",
            stream: false,
        };

        let response = self.generate(TaskType::Revision, &request).await?;
        parse_revision(&response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.default_model
    }

    fn host(&self) -> &str {
        &self.base_url
    }

    fn router_info(&self) -> RouterInfo {
        let config = self.router.config();
        let task_models = TaskType::all()
            .iter()
            .map(|task| {
                (
                    task.as_str().to_string(),
                    self.router.model_for_task(*task).to_string(),
                )
            })
            .filter(|(_, model)| *model != config.default_model)
            .collect();

        RouterInfo {
            default_model: config.default_model.clone(),
            task_models,
            vision_alternates: config.vision_alternates.clone(),
        }
    }
}
