//! Pluggable AI backend abstraction
//!
//! The workflow makes three kinds of model calls: reading a receipt image
//! (vision), picking a category, and applying reviewer instructions to a
//! draft. This module hides where those calls go.
//!
//! # Architecture
//!
//! - `AIBackend` trait: defines the interface for all AI operations
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Backend implementations: `OllamaBackend`, `OpenAICompatibleBackend`, `MockBackend`
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Backend to use (ollama, openai_compatible, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for ollama backend)
//! - `OLLAMA_MODEL`: Default model name (default: llama3.2)
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required for openai_compatible backend)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

mod mock;
mod ollama;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use mock::{MockBackend, MockCall};
pub use ollama::OllamaBackend;
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::prompts::{PromptId, PromptLibrary};

#[async_trait]
pub trait AIBackend: Send + Sync {
    /// Read a base64-encoded receipt image into loosely typed fields
    ///
    /// `payment_methods` is offered to the model as the list to choose from.
    /// `vision_model` overrides the routed vision model.
    async fn extract_receipt(
        &self,
        image_base64: &str,
        payment_methods: &[String],
        vision_model: Option<&str>,
    ) -> Result<ReceiptFields>;

    /// Pick the best-fitting category name for a draft
    async fn classify_expense(
        &self,
        draft: &ReceiptFields,
        categories: &[String],
        model: Option<&str>,
    ) -> Result<CategoryChoice>;

    /// Apply reviewer instructions to a draft, returning the full revised draft
    async fn revise_expense(
        &self,
        request: &RevisionRequest<'_>,
        model: Option<&str>,
    ) -> Result<ReceiptFields>;

    async fn health_check(&self) -> bool;

    fn model(&self) -> &str;

    fn host(&self) -> &str;

    fn router_info(&self) -> RouterInfo;
}

#[derive(Clone)]
pub enum AIClient {
    Ollama(OllamaBackend),
    OpenAICompatible(OpenAICompatibleBackend),
    Mock(MockBackend),
}

impl AIClient {
    /// Create from environment variables; `None` when the chosen backend is not configured
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaBackend::from_env().map(AIClient::Ollama),
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                OpenAICompatibleBackend::from_env().map(AIClient::OpenAICompatible)
            }
            "mock" => Some(AIClient::Mock(MockBackend::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaBackend::from_env().map(AIClient::Ollama)
            }
        }
    }

    pub fn ollama(host: &str, model: &str) -> Self {
        AIClient::Ollama(OllamaBackend::new(host, model))
    }

    pub fn mock() -> Self {
        AIClient::Mock(MockBackend::new())
    }

    pub fn with_model(&self, model: &str) -> Self {
        match self {
            AIClient::Ollama(b) => AIClient::Ollama(b.with_model(model)),
            AIClient::OpenAICompatible(b) => AIClient::OpenAICompatible(b.with_model(model)),
            AIClient::Mock(b) => AIClient::Mock(b.with_model(model)),
        }
    }
}

// Implement AIBackend for AIClient by delegating to the inner backend
#[async_trait]
impl AIBackend for AIClient {
    async fn extract_receipt(
        &self,
        image_base64: &str,
        payment_methods: &[String],
        vision_model: Option<&str>,
    ) -> Result<ReceiptFields> {
        match self {
            AIClient::Ollama(b) => {
                b.extract_receipt(image_base64, payment_methods, vision_model)
                    .await
            }
            AIClient::OpenAICompatible(b) => {
                b.extract_receipt(image_base64, payment_methods, vision_model)
                    .await
            }
            AIClient::Mock(b) => {
                b.extract_receipt(image_base64, payment_methods, vision_model)
                    .await
            }
        }
    }

    async fn classify_expense(
        &self,
        draft: &ReceiptFields,
        categories: &[String],
        model: Option<&str>,
    ) -> Result<CategoryChoice> {
        match self {
            AIClient::Ollama(b) => b.classify_expense(draft, categories, model).await,
            AIClient::OpenAICompatible(b) => b.classify_expense(draft, categories, model).await,
            AIClient::Mock(b) => b.classify_expense(draft, categories, model).await,
        }
    }

    async fn revise_expense(
        &self,
        request: &RevisionRequest<'_>,
        model: Option<&str>,
    ) -> Result<ReceiptFields> {
        match self {
            AIClient::Ollama(b) => b.revise_expense(request, model).await,
            AIClient::OpenAICompatible(b) => b.revise_expense(request, model).await,
            AIClient::Mock(b) => b.revise_expense(request, model).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(b) => b.health_check().await,
            AIClient::OpenAICompatible(b) => b.health_check().await,
            AIClient::Mock(b) => b.health_check().await,
        }
    }

    fn model(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.model(),
            AIClient::OpenAICompatible(b) => b.model(),
            AIClient::Mock(b) => b.model(),
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(b) => b.host(),
            AIClient::OpenAICompatible(b) => b.host(),
            AIClient::Mock(b) => b.host(),
        }
    }

    fn router_info(&self) -> RouterInfo {
        match self {
            AIClient::Ollama(b) => b.router_info(),
            AIClient::OpenAICompatible(b) => b.router_info(),
            AIClient::Mock(b) => b.router_info(),
        }
    }
}

/// A prompt rendered for one call: optional system section plus user section
pub(crate) struct RenderedPrompt {
    pub system: Option<String>,
    pub user: String,
}

/// Render a prompt from the shared library
pub(crate) fn render_prompt(
    prompts: &RwLock<PromptLibrary>,
    id: PromptId,
    vars: &HashMap<&str, &str>,
) -> Result<RenderedPrompt> {
    let mut prompts = prompts
        .write()
        .map_err(|_| Error::InvalidData("Failed to acquire prompt library lock".into()))?;
    let template = prompts.get(id)?;
    Ok(RenderedPrompt {
        system: template.render_system(vars),
        user: template.render_user(vars),
    })
}

/// Template variables for a classification call
pub(crate) fn classification_vars(
    draft: &ReceiptFields,
    categories: &[String],
) -> Vec<(&'static str, String)> {
    let mut vars = draft.template_vars();
    vars.push(("categories", categories.join(", ")));
    vars
}

/// Template variables for a revision call
pub(crate) fn revision_vars(request: &RevisionRequest<'_>) -> Vec<(&'static str, String)> {
    let mut vars = request.draft.template_vars();
    vars.push(("instructions", request.instructions.to_string()));
    vars.push(("categories", request.categories.join(", ")));
    vars.push(("payment_methods", request.payment_methods.join(", ")));
    vars.push(("issues", request.issues.join("; ")));
    vars
}

/// Borrow owned template variables as the map the prompt library expects
pub(crate) fn as_var_map<'a>(vars: &'a [(&'static str, String)]) -> HashMap<&'a str, &'a str> {
    vars.iter().map(|(k, v)| (*k, v.as_str())).collect()
}
