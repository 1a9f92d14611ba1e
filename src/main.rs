use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use signal_relay::chatbot::{
    BotService, Command, CommandRouter, CompletionClient, Handlers, ModelSelection, SessionStore,
    SignalClient,
};
use signal_relay::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    // Optional env file path, otherwise `.env` in the working directory.
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_env_file(path),
        None => {
            dotenvy::dotenv().ok();
            Config::from_env()
        }
    };

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            init_logging(None);
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = init_logging(config.log_dir.as_deref());

    info!("🚀 Starting signal-relay...");

    let client = match CompletionClient::new(&config.api_base_url, config.request_timeout) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create API client: {e}");
            return ExitCode::FAILURE;
        }
    };

    let signal = match SignalClient::new(&config.signal_service, &config.phone_number, config.request_timeout) {
        Ok(signal) => signal,
        Err(e) => {
            error!("Failed to create Signal client: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = signal.check_connection().await {
        warn!("Signal gateway not reachable yet: {e}");
    }

    info!("Starting Signal bot on {} with number {}", config.signal_service, config.phone_number);
    info!("Using PrivateMode API at {}", config.api_base_url);
    match &config.model {
        ModelSelection::Fixed(model) => info!("Using model: {model}"),
        ModelSelection::Auto => info!("No model configured, using the first listed model"),
    }
    for command in Command::ALL {
        info!("Registered command: {} - {}", command.name(), command.description());
    }

    let sessions = Arc::new(SessionStore::new());
    let handlers = Handlers::new(sessions, Arc::new(client), config.model.clone());
    let router = Arc::new(CommandRouter::new(handlers));
    let service = BotService::new(Arc::new(signal), router, config.poll_interval);

    service
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            info!("Ctrl-C received, shutting down");
        })
        .await;

    ExitCode::SUCCESS
}

/// Stdout logging, plus a log file when a directory is configured.
fn init_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_filter(env_filter());

    let (file_layer, guard) = match log_dir.and_then(open_log_file) {
        Some(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

fn open_log_file(log_dir: &Path) -> Option<std::fs::File> {
    let opened = std::fs::create_dir_all(log_dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("signal-relay.log"))
    });

    match opened {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Failed to open log file in {}: {e}", log_dir.display());
            None
        }
    }
}
