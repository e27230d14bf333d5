//! Veritas application binary - composition root.
//!
//! 1. Parse CLI args and load configuration (file, env, flags)
//! 2. Initialise tracing
//! 3. Build the collaborators, conversation store, writer pool, and orchestrator
//! 4. Serve the API with its session cleanup task, or run a one-shot command

mod cli;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use veritas_api::auth::load_or_generate_token;
use veritas_api::{start_server, AppState, CleanupTask, SessionRegistry};
use veritas_core::VeritasConfig;
use veritas_llm::{HttpRetriever, OpenAiChatModel, TavilySearch};
use veritas_rag::history::pair_up;
use veritas_rag::{Collaborators, HistoryWriter, Orchestrator, RagConfig};
use veritas_storage::JsonFileStore;

use crate::cli::{CliArgs, Command};

type AppResult<T> = Result<T, Box<dyn std::error::Error>>;

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Assemble the orchestrator and the writer pool it persists through.
fn build_orchestrator(config: &VeritasConfig) -> AppResult<(Arc<Orchestrator>, Arc<HistoryWriter>)> {
    let timeout = config.model.request_timeout_secs;
    if config.model.api_key.is_empty() {
        tracing::warn!("No model API key configured (set MODEL_API_KEY)");
    }
    let web_search = TavilySearch::new(&config.search, timeout)?;
    if !web_search.is_configured() {
        tracing::warn!("No Tavily API key configured, web search will fail (set TAVILY_API_KEY)");
    }

    let collaborators = Collaborators::new(
        Arc::new(OpenAiChatModel::new(&config.model)?),
        Arc::new(HttpRetriever::new(&config.search, timeout)?),
        Arc::new(web_search),
    );

    let store_dir = config.history.store_dir(&config.general);
    let store = Arc::new(JsonFileStore::new(&store_dir, config.history.file_pattern.clone()));
    tracing::info!(dir = %store_dir.display(), "Conversation store ready");

    let writer = Arc::new(HistoryWriter::new(store.clone(), config.history.writer_pool_size));
    let orchestrator = Arc::new(Orchestrator::new(
        collaborators,
        store,
        Arc::clone(&writer),
        RagConfig::from_config(config),
    ));
    Ok((orchestrator, writer))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn serve(config: VeritasConfig, orchestrator: Arc<Orchestrator>) -> AppResult<()> {
    let data_dir = config.general.data_path();
    std::fs::create_dir_all(&data_dir).map_err(|e| {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        e
    })?;
    let token_path = data_dir.join("api_token");
    let api_token = load_or_generate_token(&token_path)?;

    let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(config.sessions.ttl_secs)));
    let cleanup = Arc::new(CleanupTask::new(
        Arc::clone(&sessions),
        Duration::from_secs(config.sessions.cleanup_interval_secs),
    ));
    let cleanup_handle = Arc::clone(&cleanup).spawn();

    let port = config.general.port;
    let state = AppState::new(config, orchestrator, sessions, api_token);
    tracing::info!("Health check at http://127.0.0.1:{}/health", port);

    let result = start_server(state, shutdown_signal()).await;

    cleanup.shutdown();
    if let Err(e) = cleanup_handle.await {
        tracing::warn!(error = %e, "Session cleanup task failed");
    }
    result.map_err(Into::into)
}

async fn ask(
    orchestrator: Arc<Orchestrator>,
    question: String,
    user: Option<String>,
    stream: bool,
) -> AppResult<()> {
    if !stream {
        let outcome = orchestrator.answer(&question, user.as_deref()).await?;
        if outcome.exhausted {
            tracing::warn!(attempts = outcome.generate_count, "Answer could not be verified");
        }
        println!("{}", outcome.generation);
        return Ok(());
    }

    let mut events = orchestrator.stream(question, user);
    let mut stdout = std::io::stdout();
    while let Some(item) = events.next().await {
        let event = item?;
        write!(stdout, "{}", event.narration())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

async fn history(orchestrator: Arc<Orchestrator>, user: Option<String>) -> AppResult<()> {
    let turns = orchestrator.history(user.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&pair_up(&turns))?);
    Ok(())
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let config_path = args.resolve_config_path();
    let (mut config, load_error) = if config_path.exists() {
        match VeritasConfig::load(&config_path) {
            Ok(config) => (config, None),
            Err(e) => (VeritasConfig::default(), Some(e)),
        }
    } else {
        (VeritasConfig::default(), None)
    };
    config.apply_env_overrides()?;
    args.apply_to(&mut config, |k| std::env::var(k).ok());

    init_tracing(&config.general.log_level);
    tracing::info!("Starting Veritas v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_path.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None => tracing::info!(path = %config_path.display(), "Configuration loaded"),
    }

    if let Command::InitConfig { force } = args.command() {
        if config_path.exists() && !force {
            return Err(format!(
                "{} already exists (use --force to overwrite)",
                config_path.display()
            )
            .into());
        }
        config.save(&config_path)?;
        println!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    let (orchestrator, writer) = build_orchestrator(&config)?;

    let result = match args.command() {
        Command::Serve => serve(config, orchestrator).await,
        Command::Ask {
            question,
            user,
            stream,
        } => ask(orchestrator, question.clone(), user.clone(), *stream).await,
        Command::History { user } => history(orchestrator, user.clone()).await,
        Command::InitConfig { .. } => Ok(()),
    };

    // Flush queued conversation writes before exiting.
    writer.shutdown().await;
    result
}
