//! TAZMIC CLI — the main entry point.
//!
//! Commands:
//! - `init`    — Write a default config file
//! - `ingest`  — Scrape a web page and index it
//! - `index`   — Index a local text or markdown file
//! - `chat`    — Interactive console chat
//! - `ask`     — Answer a single question
//! - `serve`   — Start the HTTP chat shell
//! - `doctor`  — Diagnose configuration and connectivity

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "tazmic",
    about = "TAZMIC — answers questions from one indexed document",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file (default: ~/.tazmic/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Collection to index into or answer from
    #[arg(long, global = true)]
    collection: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Scrape a web page and index its markdown
    Ingest {
        #[arg(short, long)]
        url: String,

        /// Drop an existing index for the same URL first
        #[arg(long)]
        replace: bool,
    },

    /// Index a local text or markdown file
    Index {
        #[arg(short, long)]
        file: PathBuf,

        /// Drop the collection first if it is already indexed
        #[arg(long)]
        force: bool,
    },

    /// Chat interactively in the console
    Chat {
        /// Conversation thread to continue
        #[arg(short, long)]
        thread: Option<String>,
    },

    /// Answer a single question and exit
    Ask {
        #[arg(short, long)]
        message: String,

        #[arg(short, long)]
        thread: Option<String>,
    },

    /// Start the HTTP chat shell
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let opts = commands::runtime::Options {
        config_path: cli.config,
        collection: cli.collection,
    };

    match cli.command {
        Commands::Init { force } => commands::init::run(&opts, force).await?,
        Commands::Ingest { url, replace } => commands::ingest::run(&opts, &url, replace).await?,
        Commands::Index { file, force } => commands::index::run(&opts, &file, force).await?,
        Commands::Chat { thread } => commands::chat::run_interactive(&opts, thread).await?,
        Commands::Ask { message, thread } => {
            commands::chat::run_single(&opts, &message, thread).await?
        }
        Commands::Serve { port } => commands::serve::run(&opts, port).await?,
        Commands::Doctor => commands::doctor::run(&opts).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
