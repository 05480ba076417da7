//! `exam-offline`: operator views over the local test store.

use anyhow::Context;
use clap::{Parser, Subcommand};
use exam_model::SessionStatus;
use exam_offline::{
    config, Database, SessionEngine, SqliteTestSessionRepository, TestSessionRepository,
    TestSummary, TopicCache,
};

#[derive(Parser)]
#[command(name = "exam-offline", about = "Inspect and manage the offline test store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Row counts for every table.
    Stats,
    /// Sessions that can still be resumed.
    Ongoing,
    /// A session with its attempts and result breakdown.
    Show {
        /// Session identifier.
        id: String,
    },
    /// Rows waiting to be pushed upstream.
    Pending,
    /// Grade and complete a resumable session now.
    Submit {
        /// Session identifier.
        id: String,
    },
    /// Cached topic counts for a subject, if still fresh.
    Topics {
        subject: String,
    },
    /// Delete the local database and topic cache.
    Nuke {
        /// Required; there is no undo.
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(data_dir = %config::get_data_dir().display(), "Using data directory");

    let topic_cache = TopicCache::new(config::get_topic_cache_dir(), config::get_topic_cache_ttl());
    let db = Database::open(&config::get_database_path())
        .await
        .context("failed to open local store")?;
    let sessions = SqliteTestSessionRepository::new(db.pool().clone());

    match cli.command {
        Commands::Stats => print_json(&db.stats().await?)?,
        Commands::Ongoing => {
            let ongoing = sessions.ongoing_sessions().await?;
            if ongoing.is_empty() {
                println!("No resumable session");
            }
            for session in ongoing {
                println!(
                    "{}  {:<9} {:>5}s left  topics: {}",
                    session.id,
                    session.status,
                    session.time_remaining_secs,
                    session.topics.join(", ")
                );
            }
        }
        Commands::Show { id } => {
            let bundle = sessions
                .load_session(&id)
                .await?
                .with_context(|| format!("no session {id}"))?;
            print_json(&bundle.session)?;
            print_json(&bundle.attempts)?;
            print_json(&TestSummary::from_attempts(&bundle.session, &bundle.attempts))?;
        }
        Commands::Pending => {
            let pending_sessions = sessions.pending_sessions().await?;
            let pending_attempts = sessions.pending_attempts().await?;
            println!(
                "{} session(s), {} attempt(s) pending",
                pending_sessions.len(),
                pending_attempts.len()
            );
            for session in pending_sessions {
                println!("  session {} ({})", session.id, session.status);
            }
            for attempt in pending_attempts {
                println!(
                    "  attempt {}/{} ({})",
                    attempt.session_id, attempt.question_id, attempt.status
                );
            }
        }
        Commands::Submit { id } => {
            let mut engine = SessionEngine::load(sessions, &id)
                .await?
                .with_context(|| format!("no session {id}"))?
                .with_tolerance(config::get_numeric_tolerance());
            match engine.session().status {
                SessionStatus::Created => engine.start().await?,
                SessionStatus::Paused => engine.resume().await?,
                _ => {}
            }
            print_json(&engine.submit().await?)?;
        }
        Commands::Topics { subject } => match topic_cache.get(&subject) {
            Some(topics) => print_json(&topics)?,
            None => println!("No fresh topic counts cached for {subject}"),
        },
        Commands::Nuke { yes } => {
            anyhow::ensure!(yes, "refusing to delete the local store without --yes");
            drop(sessions);
            db.nuke().await.context("failed to delete local store")?;
            topic_cache.clear()?;
            println!("Local store deleted");
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
