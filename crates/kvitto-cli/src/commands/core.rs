//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use kvitto_core::db::Database;

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path, no_encrypt)?;

    if no_encrypt {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    let categories = db.list_categories()?.len();
    let payment_methods = db.list_payment_methods()?.len();
    println!(
        "   {} categories, {} payment methods",
        categories, payment_methods
    );

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    if categories == 0 || payment_methods == 0 {
        println!("  1. Load reference data: kvitto seed --file config/reference.yml");
        println!("  2. Process a receipt: kvitto process receipt.jpg");
    } else {
        println!("  1. Process a receipt: kvitto process receipt.jpg");
    }

    Ok(())
}
