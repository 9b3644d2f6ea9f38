//! KnowClaw - Approval-gated knowledge assistant for team chat
//!
//! Answers questions from markdown knowledge documents and routes every
//! proposed change through a reviewer before it is written.

use anyhow::Result;
use clap::{Parser, Subcommand};
use knowclaw::{
    config::KnowClawConfig,
    gateway::GatewayBuilder,
    records::RecordStore,
    storage::Database,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "knowclaw")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Approval-gated knowledge assistant for team chat")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "KNOWCLAW_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway and admin API
    Serve {
        /// Host to bind to (overrides the configuration)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the configuration)
        #[arg(long)]
        port: Option<u16>,
    },

    /// List records awaiting review
    Pending,

    /// List or search approved memories
    Memories {
        /// Case-insensitive search over content, context and tags
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum number of memories to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("knowclaw={0},tower_http={0}", log_level).into());
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let config = match &cli.config {
        Some(path) => KnowClawConfig::load(path)?,
        None => KnowClawConfig::default(),
    };

    match cli.command {
        Commands::Serve { host, port } => {
            run_serve(config, host, port).await?;
        }
        Commands::Pending => {
            show_pending(&config).await?;
        }
        Commands::Memories { query, limit } => {
            show_memories(&config, query.as_deref(), limit).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

async fn run_serve(config: KnowClawConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut builder = GatewayBuilder::new().config(config);
    if let Some(host) = host {
        builder = builder.host(host);
    }
    if let Some(port) = port {
        builder = builder.port(port);
    }

    let gateway = Arc::new(builder.build().await?);
    gateway.start().await?;

    tracing::info!("KnowClaw is running. Press Ctrl+C to stop.");

    gateway.serve().await?;

    Ok(())
}

fn open_records(config: &KnowClawConfig) -> Result<RecordStore> {
    let db = Database::open(config.storage.database_path())?;
    Ok(RecordStore::new(db))
}

async fn show_pending(config: &KnowClawConfig) -> Result<()> {
    let records = open_records(config)?;
    let updates = records.list_pending_updates().await?;
    let candidates = records.list_pending_memory_candidates().await?;

    if updates.is_empty() && candidates.is_empty() {
        println!("Nothing awaiting review.");
        return Ok(());
    }

    if !updates.is_empty() {
        println!("Pending updates ({}):", updates.len());
        for update in &updates {
            println!(
                "  {}  [{}] {}: {}  (from {}, {})",
                update.id,
                update.kind,
                update.target,
                update.value,
                update.submitted_by,
                update.submitted_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    if !candidates.is_empty() {
        println!("Pending memory candidates ({}):", candidates.len());
        for candidate in &candidates {
            println!(
                "  {}  {} item(s) from thread {} in {}  (from {})",
                candidate.id,
                candidate.extracted_memories.len(),
                candidate.thread_ref,
                candidate.channel_ref,
                candidate.submitted_by
            );
            for item in &candidate.extracted_memories {
                println!("      - [{}] {}", item.memory_type, item.content);
            }
        }
    }

    Ok(())
}

async fn show_memories(config: &KnowClawConfig, query: Option<&str>, limit: usize) -> Result<()> {
    let records = open_records(config)?;
    let memories = match query {
        Some(q) => records.search_memories(q, limit).await?,
        None => records.list_memories(limit).await?,
    };

    if memories.is_empty() {
        println!("No memories found.");
        return Ok(());
    }

    for memory in &memories {
        let tags = if memory.tags.is_empty() {
            String::new()
        } else {
            format!("  #{}", memory.tags.join(" #"))
        };
        println!(
            "{}  [{}] {}{}",
            memory.id, memory.memory_type, memory.content, tags
        );
        if let Some(context) = &memory.context {
            println!("    {}", context);
        }
    }

    Ok(())
}

fn show_config(config: Option<&KnowClawConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
