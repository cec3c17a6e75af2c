use anyhow::{Context, Result};
use asa_application::RelayService;
use asa_application::widget::{HttpRelayTransport, SendOutcome, WidgetController};
use asa_core::config::{SettingsProvider, WidgetSettings};
use asa_core::page::PageContext;
use asa_infrastructure::{
    AsaPaths, FileSettingsProvider, JsonFileKeyValueStore, MemoryKeyValueStore, MemoryProactiveCache,
};
use asa_interaction::GeminiClient;
use asa_server::{AppState, serve};
use asa_telemetry::{TelemetryConfig, init_tracing};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "asa-relay")]
#[command(about = "ASA relay - chat and proactive-message relay for the sales assistant widget", long_about = None)]
struct Cli {
    /// Directory holding settings.toml, error.log and client state
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay HTTP server (default)
    Serve(ServeArgs),
    /// Send one message through a running relay, like the widget would
    Ask(AskArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8787")]
    bind: SocketAddr,

    /// Explicit settings file, overriding the one in the config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for daily rolling logs
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            config: None,
            log_dir: None,
        }
    }
}

#[derive(Args)]
struct AskArgs {
    message: String,

    /// Base URL of the relay
    #[arg(long, default_value = "http://127.0.0.1:8787")]
    relay: String,

    #[arg(long, default_value = "")]
    page_url: String,

    #[arg(long, default_value = "")]
    page_title: String,

    /// File whose text is used as the page content
    #[arg(long)]
    page_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = AsaPaths::new(cli.config_dir.as_deref());

    match cli.command {
        Some(Commands::Ask(args)) => ask(&paths, args).await,
        Some(Commands::Serve(args)) => run_server(&paths, args).await,
        None => run_server(&paths, ServeArgs::default()).await,
    }
}

async fn run_server(paths: &AsaPaths, args: ServeArgs) -> Result<()> {
    let _telemetry = init_tracing(TelemetryConfig {
        log_dir: args.log_dir,
        error_log: Some(paths.error_log_file()?),
        ..TelemetryConfig::default()
    })?;

    let settings = match &args.config {
        Some(path) => FileSettingsProvider::with_path(path.clone()),
        None => FileSettingsProvider::with_path(paths.settings_file()?),
    };
    let snapshot = settings.settings();
    if !snapshot.has_api_key() {
        tracing::warn!(
            "[Server] No API key configured in {}; chat requests will be rejected",
            settings.path().display()
        );
    }

    let backend = GeminiClient::from_settings(&snapshot);
    let relay = RelayService::new(
        Arc::new(settings),
        Arc::new(backend),
        Arc::new(MemoryProactiveCache::new()),
    );

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    serve(listener, AppState::new(Arc::new(relay))).await
}

async fn ask(paths: &AsaPaths, args: AskArgs) -> Result<()> {
    let relay_url = args.relay.trim_end_matches('/').to_string();
    let widget_settings: WidgetSettings = reqwest::get(format!("{relay_url}/widget-settings"))
        .await
        .context("Failed to reach relay")?
        .json()
        .await
        .context("Relay returned invalid widget settings")?;

    let content = match &args.page_file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => String::new(),
    };

    let widget = WidgetController::new(
        Arc::new(HttpRelayTransport::new(relay_url)),
        Arc::new(JsonFileKeyValueStore::new(paths.client_state_file()?)),
        Arc::new(MemoryKeyValueStore::new()),
        widget_settings,
        PageContext::from_page_text(args.page_url, args.page_title, &content),
    );

    match widget.send(&args.message).await {
        SendOutcome::Replied(reply) => println!("{reply}"),
        SendOutcome::Failed(error) => anyhow::bail!(error),
        SendOutcome::Ignored => anyhow::bail!("Message not sent: empty message or no API key configured"),
    }
    Ok(())
}
