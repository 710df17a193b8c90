//! Reference data seeding

use std::path::Path;

use anyhow::{Context, Result};
use kvitto_core::db::Database;
use kvitto_core::seed::{seed_reference_data, SeedConfig};

pub fn cmd_seed(db: &Database, file: &Path) -> Result<()> {
    let config = SeedConfig::from_path(file)
        .with_context(|| format!("Failed to read seed file {}", file.display()))?;

    let report = seed_reference_data(db, &config)?;

    println!(
        "🌱 Seeded {} categories and {} payment methods",
        report.categories_created, report.payment_methods_created
    );
    if !report.skipped.is_empty() {
        println!("   Already present: {}", report.skipped.join(", "));
    }

    Ok(())
}
