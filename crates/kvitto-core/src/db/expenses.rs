//! Expense operations

use chrono::{Local, NaiveDate};
use rusqlite::{params, OptionalExtension, Row};

use super::{is_constraint, parse_date_column, parse_datetime, parse_decimal_column, Database};
use crate::error::{Error, Result};
use crate::models::{BusinessOrPersonal, Expense, ExpenseFilter, NewExpense};

const EXPENSE_COLUMNS: &str = "transaction_id, date, category_id, description, amount, vat, \
     payment_method_id, business_personal, declared_on, created_at";

fn row_to_expense(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let date_str: String = row.get(1)?;
    let amount_str: String = row.get(4)?;
    let vat_str: String = row.get(5)?;
    let bp_str: String = row.get(7)?;
    let declared_str: String = row.get(8)?;
    let created_at_str: String = row.get(9)?;

    Ok(Expense {
        transaction_id: row.get(0)?,
        date: parse_date_column(1, &date_str)?,
        category_id: row.get(2)?,
        description: row.get(3)?,
        amount: parse_decimal_column(4, &amount_str)?,
        vat: parse_decimal_column(5, &vat_str)?,
        payment_method_id: row.get(6)?,
        business_personal: bp_str.parse().unwrap_or(BusinessOrPersonal::Personal),
        declared_on: parse_date_column(8, &declared_str)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Store a finalized expense, rejecting future dates and negative amounts
    pub fn create_expense(&self, expense: &NewExpense) -> Result<Expense> {
        self.create_expense_on(expense, Local::now().date_naive())
    }

    /// Store an expense using `today` as the reference for date validation
    pub fn create_expense_on(&self, expense: &NewExpense, today: NaiveDate) -> Result<Expense> {
        expense.validate(today).map_err(Error::InvalidData)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO expenses (date, category_id, description, amount, vat, payment_method_id, business_personal, declared_on)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                expense.date.to_string(),
                expense.category_id,
                expense.description.trim(),
                expense.amount.to_string(),
                expense.vat.to_string(),
                expense.payment_method_id,
                expense.business_personal.as_str(),
                today.to_string(),
            ],
        )
        .map_err(|e| {
            if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) {
                Error::InvalidData(format!(
                    "Unknown category {} or payment method {}",
                    expense.category_id, expense.payment_method_id
                ))
            } else {
                Error::Database(e)
            }
        })?;

        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_expense(id)?
            .ok_or_else(|| Error::NotFound(format!("expense {}", id)))
    }

    /// Get an expense by transaction id
    pub fn get_expense(&self, transaction_id: i64) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        let expense = conn
            .query_row(
                &format!(
                    "SELECT {} FROM expenses WHERE transaction_id = ?",
                    EXPENSE_COLUMNS
                ),
                params![transaction_id],
                row_to_expense,
            )
            .optional()?;

        Ok(expense)
    }

    /// List expenses matching every set filter, oldest first
    pub fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>> {
        let mut conditions = Vec::new();
        let mut query_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(id) = filter.category_id {
            conditions.push("category_id = ?");
            query_params.push(Box::new(id));
        }
        if let Some(id) = filter.payment_method_id {
            conditions.push("payment_method_id = ?");
            query_params.push(Box::new(id));
        }
        if let Some(start) = filter.start_date {
            conditions.push("date >= ?");
            query_params.push(Box::new(start.to_string()));
        }
        if let Some(end) = filter.end_date {
            conditions.push("date <= ?");
            query_params.push(Box::new(end.to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM expenses {} ORDER BY date, transaction_id",
            EXPENSE_COLUMNS, where_clause
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            query_params.iter().map(|p| p.as_ref()).collect();

        let expenses = stmt
            .query_map(params_refs.as_slice(), row_to_expense)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    /// Delete an expense by transaction id
    pub fn delete_expense(&self, transaction_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM expenses WHERE transaction_id = ?",
            params![transaction_id],
        )?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("expense {}", transaction_id)));
        }
        Ok(())
    }
}
