use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::api::{HttpTransport, Transport};
use crate::cache::CacheShim;
use crate::config::ConfigLoader;
use crate::storage::{self, KeyValueStore, MemoryStore};

pub mod commands;

use self::commands::{
    AuthArgs, CacheArgs, CommandContext, CommentArgs, ListArgs, ScheduleArgs, UserArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "newsdesk",
    version,
    about = "Browse and manage news portal listings from the terminal"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file location (takes precedence over NEWSDESK_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over NEWSDESK_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Keep the cache in memory for this run only
    #[arg(long)]
    pub ephemeral: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch one page of a list resource
    List(ListArgs),
    /// Show the known list resources
    Resources,
    /// Read and manage article comments
    Comments(CommentArgs),
    /// Look up users
    Users(UserArgs),
    /// Show the fixtures of a league
    Schedule(ScheduleArgs),
    /// Inspect or clear the local cache
    Cache(CacheArgs),
    /// Manage the stored session
    Auth(AuthArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var("NEWSDESK_CONFIG", path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var("NEWSDESK_DATA", path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;

    let store: Arc<dyn KeyValueStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        let handle = storage::init(&paths, &config.storage)?;
        match handle.run_wal_health_check() {
            Ok(stats) => tracing::debug!(?stats, "wal checkpoint"),
            Err(err) => tracing::warn!(error = %err, "wal checkpoint failed"),
        }
        Arc::new(handle)
    };
    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new(&config.api).context("building http client")?);
    let ctx = CommandContext::new(Arc::new(config), CacheShim::new(store), transport);

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let output = runtime.block_on(dispatch(&ctx, cli.command))?;
    print!("{output}");
    Ok(())
}

async fn dispatch(ctx: &CommandContext, command: Commands) -> Result<String> {
    match command {
        Commands::List(args) => commands::list_resource(ctx, args).await,
        Commands::Resources => Ok(commands::list_resources(&ctx.config)),
        Commands::Comments(args) => commands::handle_comment_command(ctx, args).await,
        Commands::Users(args) => commands::handle_user_command(ctx, args).await,
        Commands::Schedule(args) => commands::show_schedule(ctx, args).await,
        Commands::Cache(args) => commands::handle_cache_command(ctx, args),
        Commands::Auth(args) => commands::handle_auth_command(ctx, args).await,
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
