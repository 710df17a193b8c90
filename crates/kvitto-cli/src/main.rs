//! Kvitto CLI - Receipt photos to bookkept expenses
//!
//! Usage:
//!   kvitto init                        Initialize database
//!   kvitto seed --file reference.yml   Load categories and payment methods
//!   kvitto process receipt.jpg         Extract, review and store one receipt
//!   kvitto serve --port 3000           Start the REST API

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Seed { file } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_seed(&db, &file)
        }
        Commands::Categories { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(CategoriesAction::List) => commands::cmd_categories_list(&db),
                Some(CategoriesAction::Add { name }) => commands::cmd_categories_add(&db, &name),
                Some(CategoriesAction::Delete { name }) => {
                    commands::cmd_categories_delete(&db, &name)
                }
            }
        }
        Commands::PaymentMethods { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None | Some(PaymentMethodsAction::List) => commands::cmd_payment_methods_list(&db),
                Some(PaymentMethodsAction::Add { name }) => {
                    commands::cmd_payment_methods_add(&db, &name)
                }
                Some(PaymentMethodsAction::Delete { id }) => {
                    commands::cmd_payment_methods_delete(&db, id)
                }
            }
        }
        Commands::Expenses { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                None => {
                    commands::cmd_expenses_list(&db, &Default::default(), false)
                }
                Some(ExpensesAction::List {
                    category,
                    payment_method,
                    from,
                    to,
                    json,
                }) => {
                    let filter = commands::build_filter(
                        &db,
                        category.as_deref(),
                        payment_method.as_deref(),
                        from,
                        to,
                    )?;
                    commands::cmd_expenses_list(&db, &filter, json)
                }
                Some(ExpensesAction::Show { id }) => commands::cmd_expenses_show(&db, id),
                Some(ExpensesAction::Delete { id }) => commands::cmd_expenses_delete(&db, id),
            }
        }
        Commands::Process {
            image,
            vision_model,
            categorizer_model,
            remote,
        } => {
            commands::cmd_process(
                &cli.db,
                cli.no_encrypt,
                &image,
                vision_model.as_deref(),
                categorizer_model.as_deref(),
                remote.as_deref(),
            )
            .await
        }
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { id }) => commands::cmd_prompts_show(&id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt).await,
    }
}
