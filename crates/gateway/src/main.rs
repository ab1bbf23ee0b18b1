use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fw_conversations::ConversationStore;
use fw_gateway::api;
use fw_gateway::config_file;
use fw_gateway::state::AppState;
use fw_providers::GroqClient;
use fw_tools::handlers::refresh::LoggingRefreshTrigger;
use fw_tools::search::UnconfiguredSearch;
use fw_tools::{ToolRouter, TripStore};

#[derive(Parser)]
#[command(name = "farewatch", about = "Vacation price-tracking chat gateway")]
struct Cli {
    /// Path to the config file (defaults to ./farewatch.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway server (default).
    Serve,
    /// Validate the config file and exit.
    ConfigValidate,
    /// Print the version.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, path) = config_file::load_config(cli.config.as_deref())?;
            tracing::info!(config = %path.display(), "farewatch starting");
            run_server(config).await
        }
        Some(Command::ConfigValidate) => {
            let (config, path) = config_file::load_config(cli.config.as_deref())?;
            let issues = config.validate();
            for issue in &issues {
                eprintln!("config: {issue}");
            }
            if issues.is_empty() {
                println!("{} is valid", path.display());
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        Some(Command::Version) => {
            println!("farewatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,fw_gateway=debug")),
        )
        .json()
        .init();
}

async fn run_server(config: fw_domain::config::Config) -> anyhow::Result<()> {
    for issue in config.validate() {
        tracing::warn!("config: {issue}");
    }

    let config = Arc::new(config);

    let llm = Arc::new(
        GroqClient::from_config(&config.llm).context("LLM client initialization failed")?,
    );

    let conversations = Arc::new(
        ConversationStore::new(&config.state.path, config.chat.max_context_tokens)
            .context("conversation store initialization failed")?,
    );

    let trips = Arc::new(TripStore::new());

    // The registry is filled here, once, and read-only afterwards.
    let mut router = ToolRouter::new();
    fw_tools::handlers::register_all(
        &mut router,
        config.trips.max_trips_per_user,
        Arc::new(LoggingRefreshTrigger),
        Arc::new(UnconfiguredSearch),
    );

    let state = AppState {
        config: config.clone(),
        llm,
        conversations,
        trips,
        router: Arc::new(router),
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(addr = %addr, "gateway listening");

    axum::serve(listener, api::build_router(state))
        .await
        .context("server error")?;
    Ok(())
}
