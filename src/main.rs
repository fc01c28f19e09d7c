use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use carrie_search_client::config::{AppConfig, CliConfig, FileConfig};
use carrie_search_client::notifications::TracingNotifier;
use carrie_search_client::search::{self, SearchRequest, UploadedFile};
use carrie_search_client::session::{
    FileSessionStore, InMemorySessionStore, SessionExpiryObserver, SessionStore,
};
use carrie_search_client::{ApiClient, RenderOptions, Renderer, SearchEngine, SearchState};

#[derive(Parser, Debug)]
#[command(name = "carrie-client", about = "Streamed Ask Carrie searches from the terminal")]
struct CliArgs {
    /// The question to ask.
    prompt: String,

    /// Base URL of the Carrie backend (e.g. "https://api.askcarrie.example").
    #[clap(long)]
    server_url: Option<String>,

    /// Path to a TOML config file.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Path to the session file holding the auth tokens.
    #[clap(long)]
    session_file: Option<PathBuf>,

    /// Continue an existing thread instead of starting a new one.
    #[clap(long)]
    thread: Option<String>,

    /// Space to search within.
    #[clap(long)]
    space: Option<String>,

    /// Attach a file to the search (repeatable).
    #[clap(long)]
    attach: Vec<PathBuf>,

    /// Model override passed through to the backend.
    #[clap(long)]
    model: Option<String>,

    /// Request timeout in seconds.
    #[clap(long, default_value_t = 300)]
    timeout_sec: u64,

    /// Print the raw answer text instead of rendered markup.
    #[clap(long)]
    raw: bool,
}

/// On unrecoverable session expiry there is no route to navigate back to
/// in a terminal; just tell the user.
struct LoggingExpiryObserver;

impl SessionExpiryObserver for LoggingExpiryObserver {
    fn session_expired(&self) {
        warn!("Session expired and could not be refreshed; run login again");
    }
}

fn read_attachment(path: &PathBuf) -> Result<UploadedFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read attachment: {:?}", path))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(UploadedFile {
        name,
        mime_type: "application/octet-stream".to_string(),
        bytes,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(
        &CliConfig {
            server_url: cli_args.server_url.clone(),
            session_file: cli_args.session_file.clone(),
            request_timeout_sec: cli_args.timeout_sec,
            publish_threshold_chars: None,
            render_citations: None,
        },
        file_config,
    )?;

    info!(
        "carrie-client {}-{} talking to {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        config.server_url
    );

    let session: Arc<dyn SessionStore> = match &config.session_file {
        Some(path) => Arc::new(FileSessionStore::open(path)?),
        None => Arc::new(InMemorySessionStore::new()),
    };

    let api = Arc::new(ApiClient::new(
        config.server_url.clone(),
        config.request_timeout_sec,
        session,
        Arc::new(LoggingExpiryObserver),
    ));
    let state = Arc::new(SearchState::new());
    let engine = SearchEngine::new(
        api,
        state.clone(),
        Arc::new(TracingNotifier),
        config.stream.clone(),
    );

    let uploaded_files = cli_args
        .attach
        .iter()
        .map(read_attachment)
        .collect::<Result<Vec<_>>>()?;

    let thread_id = cli_args
        .thread
        .clone()
        .unwrap_or_else(search::new_thread_id);
    let request = SearchRequest {
        prompt: cli_args.prompt.clone(),
        search_result_id: None,
        thread_id: thread_id.clone(),
        space_id: cli_args.space.clone(),
        selected_text: None,
        uploaded_files,
        model: cli_args.model.clone(),
        use_web_sources: true,
        is_first_search_of_thread: cli_args.thread.is_none(),
    };

    info!(thread_id = %thread_id, "Firing search");
    engine.fire_search(request, CancellationToken::new()).await;

    let entries = state.entries();
    let Some(entry) = entries.last() else {
        bail!("No search was performed (empty prompt?)");
    };

    if let Some(image_url) = &entry.content.image_url {
        println!("{}", image_url);
    } else if let Some(doc_url) = &entry.content.doc_url {
        match &entry.content.doc_name {
            Some(name) => println!("{} ({})", doc_url, name),
            None => println!("{}", doc_url),
        }
    } else if cli_args.raw {
        println!("{}", entry.content.text);
    } else {
        let renderer = Renderer::new(RenderOptions {
            render_citations: config.render.citations,
        });
        println!("{}", renderer.render(&entry.content.text, &[]));
    }

    Ok(())
}
