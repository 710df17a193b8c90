//! Payment method operations

use rusqlite::params;

use super::{map_constraint_violation, Database};
use crate::error::{Error, Result};
use crate::models::PaymentMethod;

impl Database {
    /// Create a payment method; names are unique
    pub fn create_payment_method(&self, name: &str) -> Result<PaymentMethod> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData(
                "Payment method name must not be empty".into(),
            ));
        }

        let conn = self.conn()?;
        conn.execute("INSERT INTO payment_methods (name) VALUES (?)", params![name])
            .map_err(|e| map_constraint_violation(e, || format!("payment method '{}'", name)))?;

        Ok(PaymentMethod {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// List all payment methods
    pub fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM payment_methods ORDER BY id")?;

        let methods = stmt
            .query_map([], |row| {
                Ok(PaymentMethod {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(methods)
    }

    /// Delete a payment method by id
    pub fn delete_payment_method(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM payment_methods WHERE id = ?", params![id])
            .map_err(|e| {
                map_constraint_violation(e, || format!("payment method {} is used by expenses", id))
            })?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("payment method {}", id)));
        }
        Ok(())
    }
}
