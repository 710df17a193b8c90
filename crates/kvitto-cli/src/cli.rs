//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Kvitto - Turn receipt photos into bookkept expenses
#[derive(Parser)]
#[command(name = "kvitto")]
#[command(about = "Receipt-to-expense workflow with a human in the loop", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "kvitto.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set KVITTO_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Load categories and payment methods from a YAML file
    Seed {
        /// YAML file with `categories:` and `payment_methods:` lists
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Manage expense categories
    Categories {
        #[command(subcommand)]
        action: Option<CategoriesAction>,
    },

    /// Manage payment methods
    PaymentMethods {
        #[command(subcommand)]
        action: Option<PaymentMethodsAction>,
    },

    /// List, show or delete stored expenses
    Expenses {
        #[command(subcommand)]
        action: Option<ExpensesAction>,
    },

    /// Run a receipt image through extraction, review and storage
    Process {
        /// Receipt image (JPEG, PNG, WebP or GIF)
        image: PathBuf,

        /// Vision model for extraction (defaults to the routed vision model)
        #[arg(long)]
        vision_model: Option<String>,

        /// Model for picking the category (defaults to the routed classification model)
        #[arg(long)]
        categorizer_model: Option<String>,

        /// Store through a running `kvitto serve` instead of the local database
        ///
        /// Falls back to KVITTO_SERVER_URL. Uses KVITTO_API_KEY for auth.
        #[arg(long)]
        remote: Option<String>,
    },

    /// Manage AI prompts
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires a bearer key from KVITTO_API_KEYS.
        #[arg(long)]
        no_auth: bool,
    },
}

#[derive(Subcommand)]
pub enum CategoriesAction {
    /// List categories
    List,
    /// Add a category
    Add {
        /// Category name
        name: String,
    },
    /// Delete a category (refused while expenses use it)
    Delete {
        /// Category name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum PaymentMethodsAction {
    /// List payment methods
    List,
    /// Add a payment method
    Add {
        /// Payment method name
        name: String,
    },
    /// Delete a payment method (refused while expenses use it)
    Delete {
        /// Payment method ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ExpensesAction {
    /// List expenses, optionally filtered
    List {
        /// Category name
        #[arg(long)]
        category: Option<String>,

        /// Payment method name
        #[arg(long)]
        payment_method: Option<String>,

        /// Earliest date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Latest date (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one expense
    Show {
        /// Transaction ID
        id: i64,
    },
    /// Delete one expense
    Delete {
        /// Transaction ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,
    /// Show the content of a prompt
    Show {
        /// Prompt ID (e.g., extract_receipt)
        id: String,
    },
    /// Show the override directory path
    Path,
}
