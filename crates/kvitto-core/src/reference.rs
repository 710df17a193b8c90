//! Reference data: the authoritative category and payment-method tables
//!
//! Loaded once before a workflow starts and shared read-only between
//! workflows through an `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{Error, Result};
use crate::gateway::ExpenseGateway;

/// Category and payment-method id -> name mappings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    categories: BTreeMap<i64, String>,
    payment_methods: BTreeMap<i64, String>,
}

/// A name matched against a reference mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub id: i64,
    /// The name as stored in the mapping
    pub name: String,
}

impl ReferenceData {
    pub fn new(
        categories: impl IntoIterator<Item = (i64, String)>,
        payment_methods: impl IntoIterator<Item = (i64, String)>,
    ) -> Self {
        Self {
            categories: categories.into_iter().collect(),
            payment_methods: payment_methods.into_iter().collect(),
        }
    }

    pub fn categories(&self) -> &BTreeMap<i64, String> {
        &self.categories
    }

    pub fn payment_methods(&self) -> &BTreeMap<i64, String> {
        &self.payment_methods
    }

    /// Category names in id order, as offered to the models
    pub fn category_names(&self) -> Vec<String> {
        self.categories.values().cloned().collect()
    }

    pub fn payment_method_names(&self) -> Vec<String> {
        self.payment_methods.values().cloned().collect()
    }

    /// Exact-name lookup of a category id
    pub fn category_id(&self, name: &str) -> Option<i64> {
        exact(&self.categories, name)
    }

    /// Exact-name lookup of a payment method id
    pub fn payment_method_id(&self, name: &str) -> Option<i64> {
        exact(&self.payment_methods, name)
    }

    /// Match a model-produced category name to the mapping
    ///
    /// Exact match first, then ignoring case and surrounding whitespace.
    pub fn resolve_category(&self, name: &str) -> Option<Resolved> {
        canonicalize(&self.categories, name)
    }

    pub fn resolve_payment_method(&self, name: &str) -> Option<Resolved> {
        canonicalize(&self.payment_methods, name)
    }
}

fn exact(map: &BTreeMap<i64, String>, name: &str) -> Option<i64> {
    map.iter().find(|(_, n)| n.as_str() == name).map(|(id, _)| *id)
}

fn canonicalize(map: &BTreeMap<i64, String>, name: &str) -> Option<Resolved> {
    let found = map.iter().find(|(_, n)| n.as_str() == name).or_else(|| {
        let wanted = name.trim().to_lowercase();
        map.iter().find(|(_, n)| n.trim().to_lowercase() == wanted)
    });

    found.map(|(id, n)| Resolved {
        id: *id,
        name: n.clone(),
    })
}

/// Fetch reference data from the gateway
///
/// Any gateway failure, or an empty category or payment-method table, is
/// reported as `ReferenceDataUnavailable` so the workflow can stop before
/// extracting.
pub async fn load_reference_data(gateway: &dyn ExpenseGateway) -> Result<Arc<ReferenceData>> {
    let categories = gateway
        .list_categories()
        .await
        .map_err(|e| Error::ReferenceDataUnavailable(format!("categories: {}", e)))?;
    let payment_methods = gateway
        .list_payment_methods()
        .await
        .map_err(|e| Error::ReferenceDataUnavailable(format!("payment methods: {}", e)))?;

    if categories.is_empty() {
        return Err(Error::ReferenceDataUnavailable(
            "no categories defined; run `kvitto seed` first".into(),
        ));
    }
    if payment_methods.is_empty() {
        return Err(Error::ReferenceDataUnavailable(
            "no payment methods defined; run `kvitto seed` first".into(),
        ));
    }

    info!(
        categories = categories.len(),
        payment_methods = payment_methods.len(),
        "Loaded reference data"
    );

    Ok(Arc::new(ReferenceData::new(
        categories.into_iter().map(|c| (c.id, c.name)),
        payment_methods.into_iter().map(|p| (p.id, p.name)),
    )))
}
