use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use libris_app::books::{
    models::{Book, BookFilter},
    service::{BookError, BookService},
};
use libris_kernel::settings::Settings;

/// Library catalog service and admin tool
#[derive(Debug, Parser)]
#[command(name = "libris", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Inspect the catalog without starting the server
    #[command(subcommand)]
    Books(BooksCommand),
    /// Print the effective configuration as JSON
    Config,
}

#[derive(Debug, Subcommand)]
enum BooksCommand {
    /// List books, optionally filtered
    List(ListArgs),
    /// Show one book as JSON
    Show { id: u64 },
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Only books on the shelf
    #[arg(long)]
    available: bool,
    /// Only lent books past their due date
    #[arg(long)]
    overdue: bool,
    /// Case-insensitive match on title or author
    #[arg(long)]
    search: Option<String>,
}

impl From<ListArgs> for BookFilter {
    fn from(args: ListArgs) -> Self {
        BookFilter {
            available: args.available,
            overdue: args.overdue,
            search: args.search,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().with_context(|| "failed to load Libris settings")?;

    match cli.command {
        Command::Serve => {
            libris_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "libris serve");
            libris_app::run(settings).await
        }
        Command::Books(command) => {
            libris_telemetry::init_for_cli(&settings.telemetry)?;
            run_books(&settings, command).await
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

async fn run_books(settings: &Settings, command: BooksCommand) -> anyhow::Result<()> {
    let service = libris_app::books::create_module(settings).service().clone();

    match command {
        BooksCommand::List(args) => {
            let books = service.list(&args.into()).await;
            for book in &books {
                println!("{}", summary(book));
            }
            Ok(())
        }
        BooksCommand::Show { id } => show(&service, id).await,
    }
}

async fn show(service: &Arc<BookService>, id: u64) -> anyhow::Result<()> {
    match service.get(id).await {
        Ok(book) => {
            println!("{}", serde_json::to_string_pretty(&book)?);
            Ok(())
        }
        Err(BookError::NotFound(id)) => anyhow::bail!("book {} not found", id),
        Err(err) => Err(err.into()),
    }
}

fn summary(book: &Book) -> String {
    let status = match (&book.reader, book.due_date) {
        (Some(reader), Some(due)) if !book.is_available => format!("lent to {reader} until {due}"),
        _ => "available".to_string(),
    };
    let year = book
        .year
        .map_or_else(|| "n.d.".to_string(), |y| y.to_string());
    format!(
        "{:>4}  {} ({}) by {} [{}]",
        book.id, book.title, year, book.author, status
    )
}
