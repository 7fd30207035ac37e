mod persist;
mod server;

use std::path::{Path, PathBuf};

use affinity_core::{CandidateItem, Event, RankingEngine, export_json};
use affinity_store::{
    DB_FILE, MemoryProfileStore, Persist, ProfileStore, Session, Settings, SqliteProfileStore,
    read_profile_file, write_profile_file,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};

type DynStore = Box<dyn ProfileStore + Send>;

#[derive(Parser)]
#[command(name = "affinity", about = "Local personalization and ranking engine")]
struct Cli {
    /// Profile to operate on
    #[arg(long, global = true, default_value = "local")]
    user: String,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start MCP server on stdio transport
    Serve,

    /// Record an interaction (view, like, unlike, collect, uncollect, search)
    Record {
        kind: String,

        #[arg(long)]
        item: Option<i64>,

        #[arg(long)]
        category: Option<i64>,

        #[arg(long)]
        keyword: Option<String>,
    },

    /// Rank candidate items read from a JSON array file
    Rank {
        path: PathBuf,

        /// Keep only the top N
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show recommended categories and keywords
    Recommend,

    /// Print the stored profile as JSON
    Show,

    /// Forget recent search keywords
    ClearKeywords,

    /// Export the profile to a JSON file
    Export {
        /// Output file path
        path: PathBuf,
    },

    /// Import a profile from a JSON file, replacing the stored one
    Import {
        /// Input file path
        path: PathBuf,
    },
}

fn data_dir() -> PathBuf {
    std::env::var("AFFINITY_DATA_DIR")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(affinity_store::default_base_dir)
}

/// Open the SQLite store, or fall back to an offline store so commands
/// still run against an empty profile.
fn open_store(dir: &Path, settings: &Settings) -> DynStore {
    let opened = std::fs::create_dir_all(dir)
        .map_err(|e| format!("failed to create {}: {e}", dir.display()))
        .and_then(|()| {
            SqliteProfileStore::open(&dir.join(DB_FILE), settings.engine.caps.clone())
                .map_err(|e| e.to_string())
        });
    match opened {
        Ok(store) => Box::new(store),
        Err(e) => {
            tracing::warn!("profile store unavailable, changes will not be saved: {e}");
            let offline = MemoryProfileStore::with_caps(settings.engine.caps.clone());
            offline.set_unavailable(true);
            Box::new(offline)
        }
    }
}

fn load_settings(dir: &Path) -> Result<Settings> {
    Settings::load(dir).context("failed to load configuration")
}

fn open_session(cli: &Cli) -> Result<(Session<DynStore>, Settings)> {
    let dir = data_dir();
    let settings = load_settings(&dir)?;
    let engine = RankingEngine::new(settings.engine.clone()).context("invalid engine config")?;
    let store = open_store(&dir, &settings);
    Ok((Session::open(store, &cli.user, engine), settings))
}

fn report(persist: &Persist) {
    if let Some(e) = persist.error() {
        eprintln!("warning: profile not saved: {e}");
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Serve => cmd_serve(&cli).await,
        Commands::Record {
            kind,
            item,
            category,
            keyword,
        } => cmd_record(&cli, kind, *item, *category, keyword.as_deref()),
        Commands::Rank { path, limit } => cmd_rank(&cli, path, *limit),
        Commands::Recommend => cmd_recommend(&cli),
        Commands::Show => cmd_show(&cli),
        Commands::ClearKeywords => cmd_clear_keywords(&cli),
        Commands::Export { path } => cmd_export(&cli, path),
        Commands::Import { path } => cmd_import(&cli, path),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => tracing::info!("received SIGTERM"),
    }
}

async fn cmd_serve(cli: &Cli) -> Result<()> {
    let dir = data_dir();
    let settings = load_settings(&dir)?;
    let engine = RankingEngine::new(settings.engine.clone()).context("invalid engine config")?;
    let store = open_store(&dir, &settings);
    let profile = store.load(&cli.user);
    tracing::info!("starting MCP server for user '{}'", cli.user);

    let (persist, worker) = persist::spawn(store);
    let server = server::AffinityServer::new(
        &cli.user,
        profile,
        engine,
        settings.categories,
        persist.clone(),
    );
    let service = match server.serve(stdio()).await {
        Ok(service) => service,
        Err(e) => {
            // Nothing was recorded yet; a client that hangs up before
            // initializing is not an error.
            tracing::info!("client disconnected before initialization: {e}");
            worker.shutdown(&persist).await;
            return Ok(());
        }
    };

    let interrupted = tokio::select! {
        quit = service.waiting() => {
            quit.context("MCP server task failed")?;
            false
        }
        _ = shutdown_signal() => true,
    };

    persist.flush().await;
    let saved = worker.shutdown(&persist).await;
    tracing::info!(saved, "MCP server stopped");

    if interrupted {
        // The stdin reader is parked in a blocking read that runtime
        // shutdown would wait on forever.
        std::process::exit(0);
    }
    Ok(())
}

fn cmd_record(
    cli: &Cli,
    kind: &str,
    item: Option<i64>,
    category: Option<i64>,
    keyword: Option<&str>,
) -> Result<()> {
    let event = Event::from_parts(kind, item, category, keyword).context("invalid event")?;
    let (mut session, _) = open_session(cli)?;
    let status = session.record(&event).context("failed to record event")?;
    report(&status);

    let verb = match status {
        Persist::Unchanged => "unchanged",
        _ => "recorded",
    };
    println!("{verb} {} for user '{}'", event.kind(), session.user_id());
    Ok(())
}

fn cmd_rank(cli: &Cli, path: &Path, limit: Option<usize>) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let candidates: Vec<CandidateItem> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of candidates", path.display()))?;

    let (session, _) = open_session(cli)?;
    let ranked = match limit {
        Some(limit) => session.rank_top(&candidates, limit),
        None => session.rank(&candidates),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&ranked).context("failed to serialize ranking")?
    );
    Ok(())
}

fn cmd_recommend(cli: &Cli) -> Result<()> {
    let (session, settings) = open_session(cli)?;
    let categories = session.recommended_category_names(&settings.categories);
    let keywords = session.recommended_keywords();

    if categories.is_empty() && keywords.is_empty() {
        println!("(no recommendations yet)");
        return Ok(());
    }
    for c in &categories {
        match &c.name {
            Some(name) => println!("category {} ({name})", c.id),
            None => println!("category {}", c.id),
        }
    }
    for k in &keywords {
        println!("keyword  {k}");
    }
    Ok(())
}

fn cmd_show(cli: &Cli) -> Result<()> {
    let (session, _) = open_session(cli)?;
    let json =
        export_json(session.user_id(), session.profile()).context("failed to serialize profile")?;
    println!("{json}");
    Ok(())
}

fn cmd_clear_keywords(cli: &Cli) -> Result<()> {
    let (mut session, _) = open_session(cli)?;
    let status = session.clear_keywords();
    report(&status);
    match status {
        Persist::Unchanged => println!("no keywords to clear"),
        _ => println!("cleared search keywords for user '{}'", session.user_id()),
    }
    Ok(())
}

fn cmd_export(cli: &Cli, path: &Path) -> Result<()> {
    let (session, _) = open_session(cli)?;
    write_profile_file(path, session.user_id(), session.profile())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("exported to {}", path.display());
    Ok(())
}

fn cmd_import(cli: &Cli, path: &Path) -> Result<()> {
    let (mut session, _) = open_session(cli)?;
    let profile = read_profile_file(path, &session.engine().config().caps)
        .with_context(|| format!("failed to import {}", path.display()))?;
    let status = session.replace_profile(profile);
    report(&status);

    let p = session.profile();
    println!(
        "imported from {}. categories={}, views={}, likes={}, collects={}, keywords={}",
        path.display(),
        p.category_affinity.len(),
        p.view_history.len(),
        p.like_history.len(),
        p.collect_history.len(),
        p.search_keywords.len(),
    );
    Ok(())
}
