//! Stored expense commands

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use kvitto_core::db::Database;
use kvitto_core::models::{Expense, ExpenseFilter};

use super::truncate;

/// Names typed on the command line, resolved into a store filter
pub fn build_filter(
    db: &Database,
    category: Option<&str>,
    payment_method: Option<&str>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<ExpenseFilter> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            bail!("--from {} is after --to {}", from, to);
        }
    }

    let category_id = match category {
        Some(name) => Some(
            db.list_categories()?
                .into_iter()
                .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
                .map(|c| c.id)
                .ok_or_else(|| anyhow!("Unknown category: {}", name))?,
        ),
        None => None,
    };

    let payment_method_id = match payment_method {
        Some(name) => Some(
            db.list_payment_methods()?
                .into_iter()
                .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
                .map(|m| m.id)
                .ok_or_else(|| anyhow!("Unknown payment method: {}", name))?,
        ),
        None => None,
    };

    Ok(ExpenseFilter {
        category_id,
        payment_method_id,
        start_date: from,
        end_date: to,
    })
}

pub fn cmd_expenses_list(db: &Database, filter: &ExpenseFilter, json: bool) -> Result<()> {
    let expenses = db.list_expenses(filter)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&expenses)?);
        return Ok(());
    }

    if expenses.is_empty() {
        if filter.is_empty() {
            println!("No expenses stored yet.");
        } else {
            println!("No expenses match the filter.");
        }
        return Ok(());
    }

    let names = Names::load(db)?;

    println!("\n🧾 Expenses ({})", expenses.len());
    println!("{}", "─".repeat(90));
    println!(
        "  {:<6} {:<10}  {:<30} {:>10} {:>8}  {:<16} {}",
        "ID", "DATE", "DESCRIPTION", "AMOUNT", "VAT", "CATEGORY", "PAID WITH"
    );
    for expense in &expenses {
        println!(
            "  #{:<5} {:<10}  {:<30} {:>10} {:>8}  {:<16} {}",
            expense.transaction_id,
            expense.date,
            truncate(&expense.description, 30),
            expense.amount,
            expense.vat,
            truncate(names.category(expense.category_id), 16),
            names.payment_method(expense.payment_method_id),
        );
    }

    let total: rust_decimal::Decimal = expenses.iter().map(|e| e.amount).sum();
    println!("{}", "─".repeat(90));
    println!("  Total: {}", total);
    println!();

    Ok(())
}

pub fn cmd_expenses_show(db: &Database, id: i64) -> Result<()> {
    let expense = db
        .get_expense(id)?
        .ok_or_else(|| anyhow!("Expense #{} not found", id))?;
    let names = Names::load(db)?;
    print_expense(&expense, &names);
    Ok(())
}

pub fn cmd_expenses_delete(db: &Database, id: i64) -> Result<()> {
    db.delete_expense(id)?;
    println!("🗑️  Deleted expense #{}", id);
    Ok(())
}

/// Id-to-name lookup for display
pub(crate) struct Names {
    categories: HashMap<i64, String>,
    payment_methods: HashMap<i64, String>,
}

impl Names {
    pub(crate) fn load(db: &Database) -> Result<Self> {
        Ok(Self {
            categories: db
                .list_categories()?
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect(),
            payment_methods: db
                .list_payment_methods()?
                .into_iter()
                .map(|m| (m.id, m.name))
                .collect(),
        })
    }

    fn category(&self, id: i64) -> &str {
        self.categories.get(&id).map(String::as_str).unwrap_or("?")
    }

    fn payment_method(&self, id: i64) -> &str {
        self.payment_methods
            .get(&id)
            .map(String::as_str)
            .unwrap_or("?")
    }
}

pub(crate) fn print_expense(expense: &Expense, names: &Names) {
    println!("Expense #{}", expense.transaction_id);
    println!("  Date:             {}", expense.date);
    println!("  Description:      {}", expense.description);
    println!("  Amount:           {}", expense.amount);
    println!("  VAT:              {}", expense.vat);
    println!(
        "  Category:         {} (#{})",
        names.category(expense.category_id),
        expense.category_id
    );
    println!(
        "  Payment method:   {} (#{})",
        names.payment_method(expense.payment_method_id),
        expense.payment_method_id
    );
    println!("  Business/personal: {}", expense.business_personal);
    println!("  Declared on:      {}", expense.declared_on);
}
