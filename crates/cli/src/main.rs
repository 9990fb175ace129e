//! Lupul și Corbul CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! lupul-cli migrate
//!
//! # Create or update an event
//! lupul-cli events create --id lansare-2026 --title "Lansare" --date 2026-11-20 --capacity 40
//!
//! # Create or update a special session
//! lupul-cli sessions create --id atelier-1 --title "Atelier" --date 2026-12-05 --max-participants 12
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations and create the sessions table
//! - `events create` - Create or update an event
//! - `sessions create` - Create or update a special session

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "lupul-cli")]
#[command(author, version, about = "Lupul și Corbul CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage events
    Events {
        #[command(subcommand)]
        action: EventAction,
    },
    /// Manage special sessions
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
enum EventAction {
    /// Create or update an event (registrations are kept)
    Create {
        /// Event id used in URLs
        #[arg(long)]
        id: String,

        /// Event title
        #[arg(short, long)]
        title: String,

        /// Event date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Start time as shown to visitors
        #[arg(long, default_value = "")]
        time: String,

        /// Where the event takes place
        #[arg(short, long, default_value = "")]
        location: String,

        /// Maximum number of attendees
        #[arg(short, long)]
        capacity: u32,

        /// Event description
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Subcommand)]
enum SessionAction {
    /// Create or update a special session (enrollments are kept)
    Create {
        /// Session id used in URLs
        #[arg(long)]
        id: String,

        /// Session title
        #[arg(short, long)]
        title: String,

        /// Session date (YYYY-MM-DD)
        #[arg(short, long)]
        date: NaiveDate,

        /// Where the session takes place
        #[arg(short, long, default_value = "")]
        location: String,

        /// Maximum number of participants
        #[arg(short, long)]
        max_participants: u32,

        /// Session description
        #[arg(long, default_value = "")]
        description: String,
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
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Events { action } => match action {
            EventAction::Create {
                id,
                title,
                date,
                time,
                location,
                capacity,
                description,
            } => {
                let event = lupul_core::event::Event {
                    id: lupul_core::EventId::new(id),
                    title,
                    description,
                    date,
                    time,
                    location,
                    capacity,
                    registered_users: Vec::new(),
                };
                commands::events::create_event(&event).await?;
            }
        },
        Commands::Sessions { action } => match action {
            SessionAction::Create {
                id,
                title,
                date,
                location,
                max_participants,
                description,
            } => {
                let session = lupul_core::event::SpecialSession {
                    id: lupul_core::SpecialSessionId::new(id),
                    title,
                    description,
                    date,
                    location,
                    max_participants,
                    current_participants: 0,
                };
                commands::events::create_session(&session).await?;
            }
        },
    }
    Ok(())
}
