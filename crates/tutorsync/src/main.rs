use std::sync::Arc;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use serde::Serialize;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use tutorsync::config::{Config, LogFormat};
use tutorsync::meeting::MemoryMeetingProvider;
use tutorsync::notify::MemoryOutbox;
use tutorsync::session::CalendarSession;
use tutorsync::state::{CalendarState, CalendarView};
use tutorsync::storage::InMemoryStore;
use tutorsync_core::calendar::{generate_seed_events, Role, Roster};
use tutorsync_core::policy::Actor;

/// tutorsync - Schedule tutoring shifts, availability and student requests
#[derive(Parser, Debug)]
#[command(name = "tutorsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Role of the acting user (teacher, tutor or student)
    #[arg(long, short, default_value = "tutor", env = "TUTORSYNC_ROLE")]
    role: Role,

    /// Email of the acting user
    #[arg(
        long,
        short,
        default_value = "ana.tutor@example.com",
        env = "TUTORSYNC_EMAIL"
    )]
    email: String,

    /// Keep materializing occurrences until Ctrl+C
    #[arg(long, short)]
    watch: bool,

    /// Number of seed documents to generate
    #[arg(long, default_value = "30", env = "TUTORSYNC_SEED_COUNT")]
    seed_count: u32,

    /// First day of the calendar window (defaults to today)
    #[arg(long)]
    from: Option<NaiveDate>,
}

#[derive(Serialize)]
struct Output<'a> {
    actor: &'a Actor,
    #[serde(flatten)]
    view: CalendarView,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    init_tracing(config.log_format);

    let from = cli.from.unwrap_or_else(|| Utc::now().date_naive());
    let store = InMemoryStore::new();
    let seed = generate_seed_events(&Roster::default(), from, cli.seed_count);
    tracing::info!(documents = seed.len(), %from, "Seeding in-memory store");
    store.seed(seed).await;

    let state = Arc::new(CalendarState::new(
        config.window_from(from),
        config.expansion_limits(),
    ));
    let actor = Actor::new(cli.role, cli.email);
    let session = CalendarSession::start(
        actor,
        &config,
        Arc::new(store),
        state,
        Arc::new(MemoryOutbox::new()),
        Arc::new(MemoryMeetingProvider::new()),
    )
    .await?;

    let output = Output {
        actor: session.actor(),
        view: session.view().await,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    if cli.watch {
        tracing::info!(
            interval_seconds = config.materialize_interval_seconds,
            "Watching, press Ctrl+C to stop"
        );
        shutdown_signal().await;
    }

    session.shutdown().await;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tutorsync=debug,tutorsync_core=debug".into());

    let layer = match format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry().with(filter).with(layer).init();
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
