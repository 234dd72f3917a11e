//! ticketd CLI — operator interface to the progression engine.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use ticketd::config::Config;
use ticketd::engine::{Pipeline, Scheduler};
use ticketd::model::{OwnerId, TicketId};
use ticketd::notify::{DisabledNotifier, Notifier, WebhookNotifier};
use ticketd::service::{Actor, TicketService};
use ticketd::store::{SqliteStore, TicketStore};
use ticketd::telemetry::init_telemetry;
use ticketd::transitions::TransitionTable;

#[derive(Parser)]
#[command(name = "ticketd", about = "Time-driven ticket status progression")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the progression scheduler daemon
    Serve,
    /// Run one progression cycle immediately
    Trigger,
    /// Show eligibility statistics
    Stats,
    /// Ticket operations
    Ticket {
        #[command(subcommand)]
        action: TicketAction,
    },
    /// Register an owner's contact address
    Owner {
        /// Owner identifier
        id: String,
        /// Display name
        name: String,
        /// Contact address for completion digests
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum TicketAction {
    /// Create a ticket
    Create {
        /// Owner identifier
        owner: String,
        title: String,
        description: String,
    },
    /// List tickets
    List {
        /// Restrict to one owner
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show a ticket with its status history
    Show {
        /// Ticket ID (full UUID or prefix)
        id: String,
    },
    /// Set a ticket's status (ownership-checked)
    SetStatus {
        /// Ticket ID (full UUID or prefix)
        id: String,
        /// One of: Open, "In Progress", Review, Testing, Done
        status: String,
        /// Acting owner; omit to act as the system
        #[arg(long)]
        owner: Option<String>,
    },
    /// Delete a ticket (ownership-checked)
    Delete {
        /// Ticket ID (full UUID or prefix)
        id: String,
        /// Acting owner; omit to act as the system
        #[arg(long)]
        owner: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();

    init_telemetry(&config.log_level)?;

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let table = TransitionTable::from_config(&config);

    match cli.command {
        Command::Serve => cmd_serve(&config, store, table).await,
        Command::Trigger => {
            let pipeline = build_pipeline(&config, Arc::clone(&store), table);
            let report = pipeline.run_cycle(chrono::Utc::now()).await;
            println!(
                "Cycle complete: {} eligible, {} advanced, {} digest(s) sent to {} owner(s)",
                report.eligible, report.advanced, report.digests_sent, report.completed_owners
            );
            Ok(())
        }
        Command::Stats => {
            let pipeline = build_pipeline(&config, Arc::clone(&store), table);
            let stats = pipeline.stats(chrono::Utc::now()).await?;
            println!("Eligible tickets: {}", stats.total_eligible);
            for (status, count) in &stats.by_status {
                println!("  {status}: {count}");
            }
            for planned in &stats.next_transitions {
                println!("  {} {} -> {}", planned.ticket_id, planned.from, planned.to);
            }
            Ok(())
        }
        Command::Ticket { action } => {
            let service = TicketService::new(store.clone(), table);
            match action {
                TicketAction::Create {
                    owner,
                    title,
                    description,
                } => {
                    let ticket = service
                        .create(OwnerId::new(owner), &title, &description)
                        .await?;
                    println!("Created: {} (status: {})", ticket.id, ticket.status);
                    Ok(())
                }
                TicketAction::List { owner } => {
                    let actor = actor_from(owner);
                    let tickets = service.list(&actor).await?;
                    if tickets.is_empty() {
                        println!("No tickets found.");
                        return Ok(());
                    }
                    println!(
                        "{:<8}  {:<12}  {:<8}  {:<30}  CREATED",
                        "ID", "STATUS", "OWNER", "TITLE"
                    );
                    println!("{}", "-".repeat(90));
                    for ticket in &tickets {
                        let title = truncate_display(&ticket.title, 30);
                        println!(
                            "{:<8}  {:<12}  {:<8}  {:<30}  {}",
                            ticket.id.to_string(),
                            ticket.status.to_string(),
                            ticket.owner.to_string(),
                            title,
                            ticket.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                    println!("\n{} ticket(s)", tickets.len());
                    Ok(())
                }
                TicketAction::Show { id } => {
                    let id = resolve_id(store.as_ref(), &id).await?;
                    let ticket = service.get(&Actor::System, id).await?;
                    println!("ID:          {}", ticket.id);
                    println!("Title:       {}", ticket.title);
                    println!("Description: {}", ticket.description);
                    println!("Status:      {}", ticket.status);
                    println!("Owner:       {}", ticket.owner);
                    println!("Created:     {}", ticket.created_at);
                    println!("Updated:     {}", ticket.updated_at);
                    println!("History:");
                    for entry in &ticket.status_history {
                        println!("  {}  {}", entry.timestamp, entry.status);
                    }
                    Ok(())
                }
                TicketAction::SetStatus { id, status, owner } => {
                    let id = resolve_id(store.as_ref(), &id).await?;
                    let ticket = service.set_status(&actor_from(owner), id, &status).await?;
                    println!("Updated: {} (status: {})", ticket.id, ticket.status);
                    Ok(())
                }
                TicketAction::Delete { id, owner } => {
                    let id = resolve_id(store.as_ref(), &id).await?;
                    service.delete(&actor_from(owner), id).await?;
                    println!("Deleted: {id}");
                    Ok(())
                }
            }
        }
        Command::Owner { id, name, email } => {
            store.register_owner(&OwnerId::new(id.clone()), &name, email.as_deref())?;
            println!("Registered owner {id}");
            Ok(())
        }
    }
}

fn build_pipeline(config: &Config, store: Arc<SqliteStore>, table: TransitionTable) -> Pipeline {
    let notifier: Arc<dyn Notifier> = match WebhookNotifier::from_config(config) {
        Some(webhook) => Arc::new(webhook),
        None => Arc::new(DisabledNotifier),
    };

    let directory: Arc<dyn ticketd::store::OwnerDirectory> = store.clone();
    let tickets: Arc<dyn TicketStore> = store;

    Pipeline::new(
        tickets,
        directory,
        notifier,
        table,
        Duration::from_secs(config.notify_timeout_seconds),
    )
}

async fn cmd_serve(
    config: &Config,
    store: Arc<SqliteStore>,
    table: TransitionTable,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(config, store, table));
    let scheduler = Scheduler::new(pipeline, Duration::from_secs(config.scan_interval_seconds));

    scheduler.start();

    tokio::signal::ctrl_c().await.ok();
    scheduler.stop();

    Ok(())
}

/// Truncate for table display without splitting a multibyte character.
fn truncate_display(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn actor_from(owner: Option<String>) -> Actor {
    match owner {
        Some(owner) => Actor::Owner(OwnerId::new(owner)),
        None => Actor::System,
    }
}

/// Support prefix matching — find the ticket whose ID starts with the given
/// string.
async fn resolve_id(store: &SqliteStore, id_str: &str) -> anyhow::Result<TicketId> {
    if id_str.len() == 36 {
        let uuid = uuid::Uuid::parse_str(id_str)?;
        return Ok(TicketId(uuid));
    }

    let tickets = store.list_all().await?;
    let matches: Vec<_> = tickets
        .iter()
        .filter(|ticket| ticket.id.0.to_string().starts_with(id_str))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no ticket matching prefix '{id_str}'"),
        1 => Ok(matches[0].id),
        n => anyhow::bail!("{n} tickets match prefix '{id_str}' — be more specific"),
    }
}
