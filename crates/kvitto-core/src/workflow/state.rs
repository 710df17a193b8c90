//! The state threaded through every workflow node

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::ai::ReceiptFields;
use crate::error::{Error, Result};
use crate::models::{BusinessOrPersonal, NewExpense};
use crate::reference::ReferenceData;

/// A reviewer's answer to "what next?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    /// Re-run extraction, optionally naming the vision model to use
    ChangeModel(Option<String>),
    Revise,
    Abandon,
}

impl Decision {
    /// The accepted tokens, for prompts and help text
    pub const HELP: &'static str =
        "a (accept), m [model] (change model), r (revise), q (abandon)";
}

impl std::str::FromStr for Decision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let token = parts.next().unwrap_or_default().to_lowercase();
        let rest: Vec<&str> = parts.collect();

        match (token.as_str(), rest.as_slice()) {
            ("a" | "accept", []) => Ok(Self::Accept),
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

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::ChangeModel(Some(model)) => write!(f, "change_model {}", model),
            Self::ChangeModel(None) => write!(f, "change_model"),
            Self::Revise => write!(f, "revise"),
            Self::Abandon => write!(f, "abandon"),
        }
    }
}

/// Something about the draft that blocks persisting it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResolutionIssue {
    /// The category name is not in the reference mapping
    UnknownCategory(String),
    UnknownPaymentMethod(String),
    MissingField(&'static str),
}

impl fmt::Display for ResolutionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCategory(name) => write!(f, "unknown category '{}'", name),
            Self::UnknownPaymentMethod(name) => write!(f, "unknown payment method '{}'", name),
            Self::MissingField(field) => write!(f, "missing {}", field),
        }
    }
}

/// The in-progress expense
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub amount: Option<Decimal>,
    pub vat: Option<Decimal>,
    pub business_personal: Option<BusinessOrPersonal>,
    pub payment_method_name: Option<String>,
    pub payment_method_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_id: Option<i64>,
}

impl Draft {
    /// The draft as loosely typed fields, for model prompts
    pub fn to_fields(&self) -> ReceiptFields {
        ReceiptFields {
            date: self.date.map(|d| d.to_string()),
            description: self.description.clone(),
            amount: self.amount.map(|a| a.to_string()),
            vat: self.vat.map(|v| v.to_string()),
            business_personal: self.business_personal.map(|b| b.as_str().to_string()),
            payment_method: self.payment_method_name.clone(),
            category: self.category_name.clone(),
        }
    }

    /// Build the record to persist
    ///
    /// Fails with `ClassificationAmbiguous` while a category or payment-method
    /// id is unresolved, and `InvalidData` while a field is missing.
    pub fn finalize(&self) -> Result<NewExpense> {
        let category_id = self.category_id.ok_or_else(|| {
            Error::ClassificationAmbiguous(format!(
                "category '{}' is not a known category",
                self.category_name.as_deref().unwrap_or("")
            ))
        })?;
        let payment_method_id = self.payment_method_id.ok_or_else(|| {
            Error::ClassificationAmbiguous(format!(
                "payment method '{}' is not a known payment method",
                self.payment_method_name.as_deref().unwrap_or("")
            ))
        })?;

        let missing = |field: &str| Error::InvalidData(format!("draft has no {}", field));
        Ok(NewExpense {
            date: self.date.ok_or_else(|| missing("date"))?,
            category_id,
            description: self
                .description
                .clone()
                .ok_or_else(|| missing("description"))?,
            amount: self.amount.ok_or_else(|| missing("amount"))?,
            vat: self.vat.ok_or_else(|| missing("vat"))?,
            payment_method_id,
            business_personal: self
                .business_personal
                .ok_or_else(|| missing("business_personal"))?,
        })
    }
}

/// Snapshot of one receipt's progress through the workflow
///
/// Nodes never mutate a state in place; each returns a new snapshot.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Loaded once, shared read-only
    pub reference: Arc<ReferenceData>,
    /// Changes only through a change-model decision
    pub vision_model: String,
    pub categorizer_model: String,
    pub image_location: String,
    /// Base64 of the image bytes, computed once
    pub image_encoded: String,
    pub draft: Draft,
    /// Set by review, consumed by the engine's transition, cleared by every other node
    pub decision: Option<Decision>,
    pub issues: Vec<ResolutionIssue>,
}

impl WorkflowState {
    pub fn new(
        reference: Arc<ReferenceData>,
        image_location: &str,
        image_bytes: &[u8],
        vision_model: &str,
        categorizer_model: &str,
    ) -> Self {
        Self {
            reference,
            vision_model: vision_model.to_string(),
            categorizer_model: categorizer_model.to_string(),
            image_location: image_location.to_string(),
            image_encoded: base64::engine::general_purpose::STANDARD.encode(image_bytes),
            draft: Draft::default(),
            decision: None,
            issues: Vec::new(),
        }
    }

    /// A new snapshot carrying `draft`, with issues recomputed and the decision cleared
    pub fn with_draft(&self, draft: Draft) -> Self {
        let mut next = Self {
            draft,
            decision: None,
            issues: Vec::new(),
            ..self.clone()
        };
        next.issues = next.compute_issues();
        next
    }

    /// A new snapshot carrying the reviewer's decision
    pub fn with_decision(&self, decision: Option<Decision>) -> Self {
        Self {
            decision,
            ..self.clone()
        }
    }

    /// A new snapshot that will extract with `model`
    pub fn with_vision_model(&self, model: &str) -> Self {
        Self {
            vision_model: model.to_string(),
            decision: None,
            ..self.clone()
        }
    }

    /// Everything that currently blocks persisting the draft
    pub fn compute_issues(&self) -> Vec<ResolutionIssue> {
        let d = &self.draft;
        let mut issues = Vec::new();

        if d.date.is_none() {
            issues.push(ResolutionIssue::MissingField("date"));
        }
        if d.description.as_deref().map_or(true, |s| s.trim().is_empty()) {
            issues.push(ResolutionIssue::MissingField("description"));
        }
        if d.amount.is_none() {
            issues.push(ResolutionIssue::MissingField("amount"));
        }
        if d.vat.is_none() {
            issues.push(ResolutionIssue::MissingField("vat"));
        }
        if d.business_personal.is_none() {
            issues.push(ResolutionIssue::MissingField("business_personal"));
        }

        match (&d.payment_method_name, d.payment_method_id) {
            (None, _) => issues.push(ResolutionIssue::MissingField("payment_method")),
            (Some(name), None) => issues.push(ResolutionIssue::UnknownPaymentMethod(name.clone())),
            _ => {}
        }
        match (&d.category_name, d.category_id) {
            (None, _) => issues.push(ResolutionIssue::MissingField("category")),
            (Some(name), None) => issues.push(ResolutionIssue::UnknownCategory(name.clone())),
            _ => {}
        }

        issues
    }

    /// Human-readable draft summary shown at review
    pub fn summary(&self) -> String {
        let d = &self.draft;
        let show = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
        let with_id = |name: &Option<String>, id: Option<i64>| match (name, id) {
            (Some(name), Some(id)) => format!("{} (#{})", name, id),
            (Some(name), None) => format!("{} (unresolved)", name),
            (None, _) => "-".to_string(),
        };

        let mut out = format!(
            "Receipt: {}\n\
             - date              = {}\n\
             - description       = {}\n\
             - amount            = {}\n\
             - vat               = {}\n\
             - business/personal = {}\n\
             - payment method    = {}\n\
             - category          = {}\n\
             - vision model      = {}",
            self.image_location,
            show(d.date.map(|x| x.to_string())),
            show(d.description.clone()),
            show(d.amount.map(|x| x.to_string())),
            show(d.vat.map(|x| x.to_string())),
            show(d.business_personal.map(|x| x.to_string())),
            with_id(&d.payment_method_name, d.payment_method_id),
            with_id(&d.category_name, d.category_id),
            self.vision_model,
        );

        if !self.issues.is_empty() {
            out.push_str("\nNeeds attention:");
            for issue in &self.issues {
                out.push_str(&format!("\n  ! {}", issue));
            }
        }
        out
    }
}
