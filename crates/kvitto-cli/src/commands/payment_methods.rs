//! Payment method commands

use anyhow::Result;
use kvitto_core::db::Database;

pub fn cmd_payment_methods_list(db: &Database) -> Result<()> {
    let methods = db.list_payment_methods()?;

    if methods.is_empty() {
        println!("No payment methods. Add one with 'kvitto payment-methods add NAME'.");
        return Ok(());
    }

    println!("\n💳 Payment Methods ({})", methods.len());
    println!("{}", "─".repeat(40));
    for method in &methods {
        println!("  #{:<5} {}", method.id, method.name);
    }
    println!();

    Ok(())
}

pub fn cmd_payment_methods_add(db: &Database, name: &str) -> Result<()> {
    let method = db.create_payment_method(name)?;
    println!("✅ Added payment method #{} {}", method.id, method.name);
    Ok(())
}

pub fn cmd_payment_methods_delete(db: &Database, id: i64) -> Result<()> {
    db.delete_payment_method(id)?;
    println!("🗑️  Deleted payment method #{}", id);
    Ok(())
}
