//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! OpenAI itself, vLLM, LocalAI, llama-server, Docker Model Runner.
//!
//! # Configuration
//!
//! Environment variables:
//! - `OPENAI_COMPATIBLE_HOST`: Server URL (required)
//! - `OPENAI_COMPATIBLE_MODEL`: Model name (default: gpt-4o-mini)
//! - `OPENAI_COMPATIBLE_API_KEY`: API key if required (optional)

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model_router::{ModelRouter, TaskType};
use crate::prompts::{PromptId, PromptLibrary};

use super::parsing::{parse_category_choice, parse_receipt_fields, parse_revision};
use super::types::{CategoryChoice, ReceiptFields, RevisionRequest, RouterInfo};
use super::{
    as_var_map, classification_vars, render_prompt, revision_vars, AIBackend, RenderedPrompt,
};

/// OpenAI-compatible backend
///
/// Works with any server implementing the OpenAI `/v1/chat/completions` API.
/// Every call uses `model` unless the caller passes an explicit model.
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    router: Arc<ModelRouter>,
    prompts: Arc<RwLock<PromptLibrary>>,
}

impl OpenAICompatibleBackend {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
            router: Arc::new(ModelRouter::default()),
            prompts: Arc::new(RwLock::new(PromptLibrary::new())),
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// Create from environment variables
    ///
    /// Required: `OPENAI_COMPATIBLE_HOST`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OPENAI_COMPATIBLE_HOST").ok()?;
        let model = std::env::var("OPENAI_COMPATIBLE_MODEL")
            .unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let api_key = std::env::var("OPENAI_COMPATIBLE_API_KEY").ok();

        let mut backend = Self::new(&host, &model);
        backend.api_key = api_key;
        Some(backend)
    }

    /// Make a chat completion request and return the first choice's text
    async fn chat_completion(
        &self,
        task: TaskType,
        model: Option<&str>,
        prompt: RenderedPrompt,
        image_base64: Option<&str>,
    ) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = prompt.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: ChatContent::Text(system),
            });
        }

        let user_content = match image_base64 {
            Some(image) => ChatContent::Parts(vec![
                ContentPart::Text { text: prompt.user },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", sniff_media_type(image), image),
                    },
                },
            ]),
            None => ChatContent::Text(prompt.user),
        };
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_content,
        });

        let request = ChatCompletionRequest {
            model: model.unwrap_or(&self.model).to_string(),
            messages,
            temperature: Some(0.0),
            max_tokens: image_base64.map(|_| 2048),
            stream: false,
        };

        let mut req_builder = self
            .http_client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .timeout(self.router.timeout_for_task(task))
            .json(&request);

        if let Some(ref api_key) = self.api_key {
            req_builder = req_builder.bearer_auth(api_key);
        }

        let response = req_builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidData(format!(
                "OpenAI API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatCompletionResponse = response.json().await?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::InvalidData("No response from OpenAI API".into()))?;

        debug!(task = task.as_str(), "OpenAI-compatible response: {}", content);
        Ok(content)
    }
}

/// Guess the image media type from the first base64 characters
fn sniff_media_type(image_base64: &str) -> &'static str {
    if image_base64.starts_with("iVBORw0KGgo") {
        "image/png"
    } else if image_base64.starts_with("R0lGOD") {
        "image/gif"
    } else if image_base64.starts_with("UklGR") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: ChatContent,
}

/// Chat message content (text or multimodal)
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Content part for multimodal messages
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl AIBackend for OpenAICompatibleBackend {
    async fn extract_receipt(
        &self,
        image_base64: &str,
        payment_methods: &[String],
        vision_model: Option<&str>,
    ) -> Result<ReceiptFields> {
        let vars = [("payment_methods", payment_methods.join(", "))];
        let prompt = render_prompt(&self.prompts, PromptId::ExtractReceipt, &as_var_map(&vars))?;

        let response = self
            .chat_completion(TaskType::Vision, vision_model, prompt, Some(image_base64))
            .await?;
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

        let response = self
            .chat_completion(TaskType::Classification, model, prompt, None)
            .await?;
        parse_category_choice(&response)
    }

    async fn revise_expense(
        &self,
        request: &RevisionRequest<'_>,
        model: Option<&str>,
    ) -> Result<ReceiptFields> {
        let vars = revision_vars(request);
        let prompt = render_prompt(&self.prompts, PromptId::ReviseExpense, &as_var_map(&vars))?;

        let response = self
            .chat_completion(TaskType::Revision, model, prompt, None)
            .await?;
        parse_revision(&response)
    }

    async fn health_check(&self) -> bool {
        // /v1/models is standard; /health covers LocalAI and Docker Model Runner
        for path in ["/v1/models", "/health"] {
            if let Ok(resp) = self
                .http_client
                .get(format!("{}{}", self.base_url, path))
                .send()
                .await
            {
                if resp.status().is_success() {
                    return true;
                }
            }
        }
        false
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }

    fn router_info(&self) -> RouterInfo {
        RouterInfo {
            default_model: self.model.clone(),
            task_models: Vec::new(),
            vision_alternates: self.router.config().vision_alternates.clone(),
        }
    }
}
