//! Category operations

use rusqlite::params;

use super::{map_constraint_violation, Database};
use crate::error::{Error, Result};
use crate::models::Category;

impl Database {
    /// Create a category; names are unique
    pub fn create_category(&self, name: &str) -> Result<Category> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidData("Category name must not be empty".into()));
        }

        let conn = self.conn()?;
        conn.execute("INSERT INTO categories (name) VALUES (?)", params![name])
            .map_err(|e| map_constraint_violation(e, || format!("category '{}'", name)))?;

        Ok(Category {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    /// List all categories
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id")?;

        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    /// Delete a category by name
    pub fn delete_category(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM categories WHERE name = ?", params![name])
            .map_err(|e| {
                map_constraint_violation(e, || format!("category '{}' is used by expenses", name))
            })?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("category '{}'", name)));
        }
        Ok(())
    }
}
