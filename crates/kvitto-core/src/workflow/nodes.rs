//! Workflow nodes
//!
//! Each node reads a `WorkflowState` and returns a new one. Nodes make at
//! most one outbound call and never decide what runs next.

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::ai::{AIBackend, ReceiptFields, RevisionRequest};
use crate::error::{Error, Result};
use crate::gateway::ExpenseGateway;
use crate::models::{BusinessOrPersonal, Expense, NewExpense};
use crate::reference::ReferenceData;

use super::review::Reviewer;
use super::state::{Decision, Draft, ResolutionIssue, WorkflowState};

/// Read the receipt image into a fresh draft
///
/// The previous draft, including its category resolution, is discarded.
pub async fn extract<B: AIBackend + ?Sized>(
    backend: &B,
    state: &WorkflowState,
) -> Result<WorkflowState> {
    let payment_methods = state.reference.payment_method_names();
    let fields = backend
        .extract_receipt(
            &state.image_encoded,
            &payment_methods,
            Some(&state.vision_model),
        )
        .await
        .map_err(|e| Error::ExtractionFailed(e.to_string()))?;

    let draft = apply_fields(&fields, Draft::default(), today(), false)
        .map_err(Error::ExtractionFailed)?;

    debug!(model = %state.vision_model, draft = ?draft, "Extracted receipt");
    Ok(state.with_draft(draft))
}

/// Choose a category and resolve both reference names to ids
pub async fn classify<B: AIBackend + ?Sized>(
    backend: &B,
    state: &WorkflowState,
) -> Result<WorkflowState> {
    let categories = state.reference.category_names();
    let choice = backend
        .classify_expense(
            &state.draft.to_fields(),
            &categories,
            Some(&state.categorizer_model),
        )
        .await
        .map_err(|e| Error::ClassificationFailed(e.to_string()))?;

    let mut draft = state.draft.clone();
    draft.category_name = non_empty(&choice.category);
    let next = state.with_draft(resolve_names(draft, &state.reference));

    warn_unresolved(&next.issues);
    Ok(next)
}

/// Ask the reviewer for a decision
///
/// Unrecognised input, or an accept while issues remain, leaves the
/// decision unset and tells the reviewer why.
pub async fn review<R: Reviewer + ?Sized>(
    reviewer: &R,
    state: &WorkflowState,
) -> Result<WorkflowState> {
    let answer = reviewer.ask_decision(state).await?;

    let decision = match answer.parse::<Decision>() {
        Ok(Decision::Accept) if !state.issues.is_empty() => {
            let reasons: Vec<String> = state.issues.iter().map(ToString::to_string).collect();
            reviewer.notify(&format!(
                "Cannot accept while the draft has issues: {}. Revise or change model first.",
                reasons.join(", ")
            ));
            None
        }
        Ok(decision) => Some(decision),
        Err(e) => {
            reviewer.notify(&e.to_string());
            None
        }
    };

    Ok(state.with_decision(decision))
}

/// Apply the reviewer's instructions to the draft
///
/// Fields the model leaves out keep their current values.
pub async fn revise<B: AIBackend + ?Sized>(
    backend: &B,
    state: &WorkflowState,
    instructions: &str,
) -> Result<WorkflowState> {
    let current = state.draft.to_fields();
    let categories = state.reference.category_names();
    let payment_methods = state.reference.payment_method_names();
    let issues: Vec<String> = state.issues.iter().map(ToString::to_string).collect();

    let request = RevisionRequest {
        draft: &current,
        instructions,
        categories: &categories,
        payment_methods: &payment_methods,
        issues: &issues,
    };
    let fields = backend
        .revise_expense(&request, None)
        .await
        .map_err(|e| Error::RevisionFailed(e.to_string()))?;

    let draft = apply_fields(&fields, state.draft.clone(), today(), true)
        .map_err(Error::RevisionFailed)?;
    let next = state.with_draft(resolve_names(draft, &state.reference));

    warn_unresolved(&next.issues);
    Ok(next)
}

/// Store a finalized record through the gateway
pub async fn persist<G: ExpenseGateway + ?Sized>(
    gateway: &G,
    record: &NewExpense,
) -> Result<Expense> {
    gateway
        .create_expense(record)
        .await
        .map_err(|e| match e {
            Error::PersistenceFailed(_) => e,
            other => Error::PersistenceFailed(other.to_string()),
        })
}

/// SHA-256 over the record's JSON form and the receipt image it came from, hex encoded
///
/// Two receipts that happen to carry the same fields hash differently.
pub fn fingerprint(record: &NewExpense, image_encoded: &str) -> Result<String> {
    let canonical = serde_json::to_string(record)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.update(b"\n");
    hasher.update(image_encoded.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn warn_unresolved(issues: &[ResolutionIssue]) {
    for issue in issues {
        if matches!(
            issue,
            ResolutionIssue::UnknownCategory(_) | ResolutionIssue::UnknownPaymentMethod(_)
        ) {
            warn!(%issue, "Draft has an unresolved reference");
        }
    }
}

/// Canonicalize category and payment-method names and set their ids
///
/// An unmatched name is kept as given, with its id cleared.
pub(crate) fn resolve_names(mut draft: Draft, reference: &ReferenceData) -> Draft {
    match draft
        .category_name
        .as_deref()
        .and_then(|name| reference.resolve_category(name))
    {
        Some(found) => {
            draft.category_name = Some(found.name);
            draft.category_id = Some(found.id);
        }
        None => draft.category_id = None,
    }

    match draft
        .payment_method_name
        .as_deref()
        .and_then(|name| reference.resolve_payment_method(name))
    {
        Some(found) => {
            draft.payment_method_name = Some(found.name);
            draft.payment_method_id = Some(found.id);
        }
        None => draft.payment_method_id = None,
    }

    draft
}

/// Merge model output into `base`, validating as it goes
///
/// With `keep_category` unset the category resolution is cleared, as a fresh
/// extraction has nothing to say about it.
pub(crate) fn apply_fields(
    fields: &ReceiptFields,
    mut base: Draft,
    today: NaiveDate,
    keep_category: bool,
) -> std::result::Result<Draft, String> {
    if let Some(raw) = &fields.date {
        let date = parse_date(raw).ok_or_else(|| format!("Unreadable date '{}'", raw))?;
        if date > today {
            return Err(format!("Date {} is in the future", date));
        }
        base.date = Some(date);
    }

    if let Some(description) = fields.description.as_deref().and_then(non_empty) {
        base.description = Some(description);
    }

    if let Some(raw) = &fields.amount {
        base.amount = Some(parse_money(raw, "amount")?);
    }
    if let Some(raw) = &fields.vat {
        base.vat = Some(parse_money(raw, "vat")?);
    }

    if let Some(raw) = &fields.business_personal {
        // An unrecognised value leaves the field for the reviewer to fix
        base.business_personal = raw.parse::<BusinessOrPersonal>().ok();
    }

    if let Some(name) = fields.payment_method.as_deref().and_then(non_empty) {
        base.payment_method_name = Some(name);
        base.payment_method_id = None;
    }

    if keep_category {
        if let Some(name) = fields.category.as_deref().and_then(non_empty) {
            base.category_name = Some(name);
            base.category_id = None;
        }
    } else {
        base.category_name = None;
        base.category_id = None;
    }

    Ok(base)
}

/// Parse a receipt date; ISO first, then US and European layouts
pub(crate) fn parse_date(s: &str) -> Option<NaiveDate> {
    let formats = [
        "%Y-%m-%d",
        "%m-%d-%Y",
        "%m/%d/%Y",
        "%Y/%m/%d",
        "%d.%m.%Y",
    ];

    let s = s.trim();
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a non-negative money amount, rounded to at least cents
pub(crate) fn parse_money(s: &str, field: &str) -> std::result::Result<Decimal, String> {
    let amount = parse_amount(s).ok_or_else(|| format!("Unreadable {} '{}'", field, s))?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(format!("{} must not be negative: {}", field, amount));
    }
    let mut amount = amount.abs();
    if amount.scale() < 2 {
        amount.rescale(2);
    }
    Ok(amount)
}

fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();

    // (12.00) is accounting notation for -12.00
    let (negative, s) = match s.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };

    // Drop currency symbols and spaces
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    // With both separators present the last one is the decimal mark
    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();
    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // "1.042,50"
        (Some(comma), Some(dot)) if comma > dot => {
            if commas > 1 {
                return None;
            }
            cleaned.replace('.', "").replace(',', ".")
        }
        // "1,042.50"
        (Some(_), Some(_)) => {
            if dots > 1 {
                return None;
            }
            cleaned.replace(',', "")
        }
        // "42,50"
        (Some(pos), None) if commas == 1 && cleaned.len() - pos <= 3 => {
            format!("{}.{}", &cleaned[..pos], &cleaned[pos + 1..])
        }
        _ => cleaned.replace(',', ""),
    };

    let amount: Decimal = normalized.parse().ok()?;
    Some(if negative { -amount.abs() } else { amount })
}
