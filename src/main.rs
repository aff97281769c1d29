use clap::{Parser, Subcommand};

use inbox_agent::commands;
use inbox_agent::config::Settings;

#[derive(Parser)]
#[command(name = "inbox-agent")]
#[command(about = "Fetch, classify, and act on email from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch recent emails, classify them, and store the results
    Fetch {
        /// Maximum number of emails to fetch
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Mailbox search query (e.g. "is:unread")
        #[arg(short, long)]
        query: Option<String>,
        /// Re-classify emails that are already stored
        #[arg(long)]
        reprocess: bool,
    },
    /// List stored emails
    ListEmails {
        /// Filter by category (URGENT, WORK, PERSONAL, ...)
        #[arg(short, long)]
        category: Option<String>,
        /// Maximum number of rows
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show one stored email in full
    Show {
        /// Email id
        id: String,
    },
    /// Summarize an email (or its whole thread)
    Summarize {
        /// Email id
        id: String,
        /// Summarize the whole thread instead of one message
        #[arg(long)]
        thread: bool,
    },
    /// Draft a reply to an email (saved, not sent)
    Draft {
        /// Email id
        id: String,
        /// Tone for the reply (professional, casual, ...)
        #[arg(short, long)]
        tone: Option<String>,
    },
    /// Send a previously saved draft
    SendDraft {
        /// Draft id
        id: i64,
        /// Recipient override (defaults to the original sender)
        #[arg(long)]
        to: Option<String>,
    },
    /// Extract action items from an email
    ExtractActions {
        /// Email id
        id: String,
    },
    /// List pending action items
    Actions,
    /// Mark an action item completed
    CompleteAction {
        /// Action id
        id: i64,
    },
    /// Show mailbox statistics
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match Settings::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Fetch {
            limit,
            query,
            reprocess,
        } => commands::fetch(&settings, limit, query, reprocess).await,
        Commands::ListEmails { category, limit } => {
            commands::list_emails(&settings, category, limit).await
        }
        Commands::Show { id } => commands::show(&settings, &id).await,
        Commands::Summarize { id, thread } => commands::summarize(&settings, &id, thread).await,
        Commands::Draft { id, tone } => commands::draft(&settings, &id, tone).await,
        Commands::SendDraft { id, to } => commands::send_draft(&settings, id, to).await,
        Commands::ExtractActions { id } => commands::extract_actions(&settings, &id).await,
        Commands::Actions => commands::actions(&settings).await,
        Commands::CompleteAction { id } => commands::complete_action(&settings, id).await,
        Commands::Stats => commands::stats(&settings).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
