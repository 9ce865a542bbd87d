use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use deepdesk_core::state::NewMessage;
use deepdesk_core::{consume_stream, telemetry, SessionStore, StreamEvent, StreamOutcome};
use futures::stream;
use serde_json::json;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for DeepDesk")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Exercise the session store and the stream ingestion loop in memory.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let sessions = SessionStore::in_memory();
    let chat_id = sessions.create_session();
    sessions.add_message(NewMessage::user("ping from xtask"));
    sessions.add_message(NewMessage::assistant("pong"));
    let Some(session) = sessions.session(&chat_id) else {
        bail!("session {chat_id} vanished");
    };
    info!(
        "messages" = session.messages.len(),
        "title" = %session.title,
        "smoke test session saved"
    );

    let records = [
        json!({"type": "step_start", "step": 1, "message": "Outlining"}),
        json!({"type": "slide", "slide_number": 1, "slide": {"type": "title", "title": "Smoke"}}),
        json!({"type": "complete", "title": "Smoke", "slides": []}),
    ];
    let body: String = records.iter().map(|record| format!("data: {record}\n\n")).collect();
    // Small chunks so records straddle reads.
    let chunks: Vec<Result<Vec<u8>, deepdesk_core::ApiError>> = body
        .as_bytes()
        .chunks(7)
        .map(|chunk| Ok(chunk.to_vec()))
        .collect();

    let runtime = Runtime::new()?;
    let mut slides = 0;
    let outcome = runtime.block_on(consume_stream(
        stream::iter(chunks),
        &CancellationToken::new(),
        |event| {
            if matches!(event, StreamEvent::Slide { .. }) {
                slides += 1;
            }
        },
    ))?;
    if outcome != StreamOutcome::Completed || slides != 1 {
        bail!("unexpected stream outcome {outcome:?} with {slides} slides");
    }
    info!("slides" = slides, "smoke test stream consumed");

    std::fs::remove_dir_all(sessions.snapshot_store().root()).ok();
    Ok(())
}
