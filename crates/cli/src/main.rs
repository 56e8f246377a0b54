//! Stampcard CLI - Role records and directory listings.
//!
//! # Usage
//!
//! ```bash
//! # Make an identity an admin
//! sc-cli user grant --uid abc123 -e admin@example.com -r admin
//!
//! # Link an identity to a business
//! sc-cli user grant --uid def456 -e owner@kess.example -r business -b kess
//!
//! # Show a role record
//! sc-cli user show --uid abc123
//!
//! # List businesses, or one business's customers
//! sc-cli business list
//! sc-cli business customers -b kess
//! ```
//!
//! # Commands
//!
//! - `user grant` - Create or replace a `users/{uid}` role record
//! - `user show` - Print a role record
//! - `business list` - List businesses, newest first
//! - `business customers` - List a business's customers by name
//!
//! Writing role records needs `FIRESTORE_ACCESS_TOKEN` with admin rights;
//! the app itself never writes them.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sc-cli")]
#[command(author, version, about = "Stampcard CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage role records
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Inspect businesses
    Business {
        #[command(subcommand)]
        action: BusinessAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create or replace a role record
    Grant {
        /// Identity provider uid
        #[arg(long)]
        uid: String,

        /// Email shown in the record
        #[arg(short, long)]
        email: Option<String>,

        /// Role (`admin` or `business`)
        #[arg(short, long)]
        role: String,

        /// Business id (required for the `business` role)
        #[arg(short, long)]
        business_id: Option<String>,
    },
    /// Show a role record
    Show {
        /// Identity provider uid
        #[arg(long)]
        uid: String,
    },
}

#[derive(Subcommand)]
enum BusinessAction {
    /// List all businesses
    List,
    /// List the customers of one business
    Customers {
        /// Business id
        #[arg(short, long)]
        business_id: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = commands::connect()?;
    match cli.command {
        Commands::User { action } => match action {
            UserAction::Grant {
                uid,
                email,
                role,
                business_id,
            } => {
                commands::user::grant(&store, &uid, email, &role, business_id).await?;
            }
            UserAction::Show { uid } => commands::user::show(&store, &uid).await?,
        },
        Commands::Business { action } => match action {
            BusinessAction::List => commands::business::list(&store).await?,
            BusinessAction::Customers { business_id } => {
                commands::business::customers(&store, &business_id).await?;
            }
        },
    }
    Ok(())
}
