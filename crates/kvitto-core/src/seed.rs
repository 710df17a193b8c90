//! Seeding categories and payment methods from a YAML file
//!
//! ```yaml
//! categories:
//!   - Office Supplies
//!   - Travel
//! payment_methods:
//!   - Visa
//!   - Cash
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{Error, Result};

/// Contents of a seed file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub payment_methods: Vec<String>,
}

impl SeedConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}

/// What a seed run changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories_created: usize,
    pub payment_methods_created: usize,
    /// Names that already existed
    pub skipped: Vec<String>,
}

/// Insert every category and payment method that does not exist yet
///
/// Safe to run repeatedly: existing names are reported as skipped.
pub fn seed_reference_data(db: &Database, config: &SeedConfig) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for name in &config.categories {
        match db.create_category(name) {
            Ok(category) => {
                debug!(id = category.id, name = %category.name, "Created category");
                report.categories_created += 1;
            }
            Err(Error::Conflict(_)) => report.skipped.push(name.clone()),
            Err(e) => return Err(e),
        }
    }

    for name in &config.payment_methods {
        match db.create_payment_method(name) {
            Ok(method) => {
                debug!(id = method.id, name = %method.name, "Created payment method");
                report.payment_methods_created += 1;
            }
            Err(Error::Conflict(_)) => report.skipped.push(name.clone()),
            Err(e) => return Err(e),
        }
    }

    info!(
        categories = report.categories_created,
        payment_methods = report.payment_methods_created,
        skipped = report.skipped.len(),
        "Seeded reference data"
    );

    Ok(report)
}
