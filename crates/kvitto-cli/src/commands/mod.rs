//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (open_db) and `init`
//! - `seed` - Load reference data from YAML
//! - `categories` - Category management
//! - `payment_methods` - Payment method management
//! - `expenses` - Stored expense listing, lookup and deletion
//! - `process` - The interactive receipt workflow
//! - `prompts` - Prompt library management commands
//! - `serve` - Web server command

pub mod categories;
pub mod core;
pub mod expenses;
pub mod payment_methods;
pub mod process;
pub mod prompts;
pub mod seed;
pub mod serve;

// Re-export command functions for main.rs
pub use categories::*;
pub use core::*;
pub use expenses::*;
pub use payment_methods::*;
pub use process::*;
pub use prompts::*;
pub use seed::*;
pub use serve::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
