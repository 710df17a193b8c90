//! AI backend request/response types
//!
//! These types are backend-agnostic and used across all AI implementations.

use serde::{Deserialize, Deserializer, Serialize};

/// Router configuration information for display
#[derive(Debug, Clone)]
pub struct RouterInfo {
    pub default_model: String,
    /// Task-specific models as (task, model)
    pub task_models: Vec<(String, String)>,
    pub vision_alternates: Vec<String>,
}

/// Receipt fields as a model reports them
///
/// Everything is optional and loosely typed: models omit fields they cannot
/// read and return amounts as either numbers or strings. The workflow
/// validates and converts these into a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptFields {
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vat: Option<String>,
    #[serde(
        default,
        alias = "business_or_personal",
        deserialize_with = "lenient_string"
    )]
    pub business_personal: Option<String>,
    #[serde(
        default,
        alias = "payment_method_name",
        deserialize_with = "lenient_string"
    )]
    pub payment_method: Option<String>,
    /// Only set by revision
    #[serde(default, alias = "category_name", deserialize_with = "lenient_string")]
    pub category: Option<String>,
}

impl ReceiptFields {
    /// Template variables describing this draft for the prompt library
    pub fn template_vars(&self) -> Vec<(&'static str, String)> {
        let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
        vec![
            ("date", show(&self.date)),
            ("description", show(&self.description)),
            ("amount", show(&self.amount)),
            ("vat", show(&self.vat)),
            ("business_personal", show(&self.business_personal)),
            ("payment_method", show(&self.payment_method)),
            ("category", show(&self.category)),
        ]
    }
}

/// Everything a backend needs to revise a draft
#[derive(Debug, Clone, Copy)]
pub struct RevisionRequest<'a> {
    pub draft: &'a ReceiptFields,
    /// Free-text instructions from the reviewer
    pub instructions: &'a str,
    pub categories: &'a [String],
    pub payment_methods: &'a [String],
    /// Outstanding problems to mention to the model
    pub issues: &'a [String],
}

/// Result of expense classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryChoice {
    pub category: String,
}

/// Accept strings, numbers or null for a text field
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
