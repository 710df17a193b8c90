//! Category commands

use anyhow::Result;
use kvitto_core::db::Database;

pub fn cmd_categories_list(db: &Database) -> Result<()> {
    let categories = db.list_categories()?;

    if categories.is_empty() {
        println!("No categories. Add one with 'kvitto categories add NAME' or run 'kvitto seed'.");
        return Ok(());
    }

    println!("\n📂 Categories ({})", categories.len());
    println!("{}", "─".repeat(40));
    for category in &categories {
        println!("  #{:<5} {}", category.id, category.name);
    }
    println!();

    Ok(())
}

pub fn cmd_categories_add(db: &Database, name: &str) -> Result<()> {
    let category = db.create_category(name)?;
    println!("✅ Added category #{} {}", category.id, category.name);
    Ok(())
}

pub fn cmd_categories_delete(db: &Database, name: &str) -> Result<()> {
    db.delete_category(name)?;
    println!("🗑️  Deleted category {}", name);
    Ok(())
}
