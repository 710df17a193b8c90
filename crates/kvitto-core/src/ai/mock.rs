//! Mock backend for testing
//!
//! Returns a fixed receipt unless a test queues specific responses. Every call
//! is recorded so tests can assert on which model handled what.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::{CategoryChoice, ReceiptFields, RevisionRequest, RouterInfo};
use super::AIBackend;

/// A call observed by the mock backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Extract {
        model: Option<String>,
        image_base64: String,
    },
    Classify {
        model: Option<String>,
        categories: Vec<String>,
    },
    Revise {
        model: Option<String>,
        instructions: String,
    },
}

/// A queued response; `Err` holds the failure message
type Scripted<T> = VecDeque<std::result::Result<T, String>>;

#[derive(Default)]
struct Script {
    extractions: Scripted<ReceiptFields>,
    classifications: Scripted<String>,
    revisions: Scripted<ReceiptFields>,
    calls: Vec<MockCall>,
}

/// Mock AI backend for testing
///
/// Clones share the same script and call log.
#[derive(Clone)]
pub struct MockBackend {
    /// Whether health_check should return true
    pub healthy: bool,
    model: String,
    script: Arc<Mutex<Script>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            model: "mock".to_string(),
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::new()
        }
    }

    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    /// The receipt returned when nothing is queued
    pub fn default_receipt() -> ReceiptFields {
        ReceiptFields {
            date: Some("2024-03-01".to_string()),
            description: Some("Printer paper and toner".to_string()),
            amount: Some("42.50".to_string()),
            vat: Some("5.00".to_string()),
            business_personal: Some("business".to_string()),
            payment_method: Some("Visa".to_string()),
            category: None,
        }
    }

    /// Queue the next extraction result
    pub fn push_extraction(&self, fields: ReceiptFields) -> &Self {
        self.with_script(|s| s.extractions.push_back(Ok(fields)));
        self
    }

    /// Queue an extraction failure
    pub fn push_extraction_error(&self, message: &str) -> &Self {
        self.with_script(|s| s.extractions.push_back(Err(message.to_string())));
        self
    }

    /// Queue the next category answer
    pub fn push_classification(&self, category: &str) -> &Self {
        self.with_script(|s| s.classifications.push_back(Ok(category.to_string())));
        self
    }

    pub fn push_classification_error(&self, message: &str) -> &Self {
        self.with_script(|s| s.classifications.push_back(Err(message.to_string())));
        self
    }

    /// Queue the next revision result
    pub fn push_revision(&self, fields: ReceiptFields) -> &Self {
        self.with_script(|s| s.revisions.push_back(Ok(fields)));
        self
    }

    pub fn push_revision_error(&self, message: &str) -> &Self {
        self.with_script(|s| s.revisions.push_back(Err(message.to_string())));
        self
    }

    /// All calls made so far, oldest first
    pub fn calls(&self) -> Vec<MockCall> {
        self.with_script(|s| s.calls.clone())
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        // A poisoned lock only means another test thread panicked mid-call
        let mut guard = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn extract_receipt(
        &self,
        image_base64: &str,
        _payment_methods: &[String],
        vision_model: Option<&str>,
    ) -> Result<ReceiptFields> {
        self.with_script(|s| {
            s.calls.push(MockCall::Extract {
                model: vision_model.map(String::from),
                image_base64: image_base64.to_string(),
            });
            match s.extractions.pop_front() {
                Some(Ok(fields)) => Ok(fields),
                Some(Err(message)) => Err(Error::InvalidData(message)),
                None => Ok(Self::default_receipt()),
            }
        })
    }

    async fn classify_expense(
        &self,
        _draft: &ReceiptFields,
        categories: &[String],
        model: Option<&str>,
    ) -> Result<CategoryChoice> {
        self.with_script(|s| {
            s.calls.push(MockCall::Classify {
                model: model.map(String::from),
                categories: categories.to_vec(),
            });
            let category = match s.classifications.pop_front() {
                Some(Ok(category)) => category,
                Some(Err(message)) => return Err(Error::InvalidData(message)),
                // Prefer the scenario category when the list has it
                None => categories
                    .iter()
                    .find(|c| c.as_str() == "Office Supplies")
                    .or_else(|| categories.first())
                    .cloned()
                    .unwrap_or_else(|| "Other".to_string()),
            };
            Ok(CategoryChoice { category })
        })
    }

    async fn revise_expense(
        &self,
        request: &RevisionRequest<'_>,
        model: Option<&str>,
    ) -> Result<ReceiptFields> {
        self.with_script(|s| {
            s.calls.push(MockCall::Revise {
                model: model.map(String::from),
                instructions: request.instructions.to_string(),
            });
            match s.revisions.pop_front() {
                Some(Ok(fields)) => Ok(fields),
                Some(Err(message)) => Err(Error::InvalidData(message)),
                None => Ok(request.draft.clone()),
            }
        })
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }

    fn router_info(&self) -> RouterInfo {
        RouterInfo {
            default_model: self.model.clone(),
            task_models: vec![],
            vision_alternates: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_receipt_and_call_log() {
        let mock = MockBackend::new();
        let fields = mock
            .extract_receipt("aGVsbG8=", &["Visa".into()], Some("vision-a"))
            .await
            .unwrap();
        assert_eq!(fields, MockBackend::default_receipt());

        let choice = mock
            .classify_expense(&fields, &["Travel".into(), "Office Supplies".into()], None)
            .await
            .unwrap();
        assert_eq!(choice.category, "Office Supplies");

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            MockCall::Extract {
                model: Some("vision-a".into()),
                image_base64: "aGVsbG8=".into()
            }
        );
    }

    #[tokio::test]
    async fn test_queued_responses_are_consumed_in_order() {
        let mock = MockBackend::new();
        mock.push_extraction_error("garbled")
            .push_extraction(ReceiptFields {
                payment_method: Some("Bitcoin".into()),
                ..MockBackend::default_receipt()
            });

        assert!(mock.extract_receipt("x", &[], None).await.is_err());
        let second = mock.extract_receipt("x", &[], None).await.unwrap();
        assert_eq!(second.payment_method.as_deref(), Some("Bitcoin"));
        let third = mock.extract_receipt("x", &[], None).await.unwrap();
        assert_eq!(third.payment_method.as_deref(), Some("Visa"));
    }

    #[tokio::test]
    async fn test_clones_share_script() {
        let mock = MockBackend::new();
        let clone = mock.with_model("other");
        clone.push_classification("Travel");

        let choice = mock
            .classify_expense(&ReceiptFields::default(), &["Travel".into()], None)
            .await
            .unwrap();
        assert_eq!(choice.category, "Travel");
        assert_eq!(mock.calls().len(), 1);
        assert_eq!(clone.model(), "other");
    }
}
