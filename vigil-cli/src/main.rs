//! Vigil CLI
//!
//! Command-line interface for the Vigil monitoring head.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vigil_head::{
    EventQuery, HeadConfig, HeadResponse, InMemoryEventSource, JsonFileEventSource, StateHead,
};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil - cluster event and log queries with admission control", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(short, long, global = true, default_value = "warn")]
    log_level: String,

    /// Head configuration file (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query cluster events
    Events {
        /// Event file (JSON array or JSON lines)
        #[arg(short, long)]
        file: PathBuf,

        /// Severity levels to keep (repeatable, comma separated)
        #[arg(long = "severity")]
        severity_levels: Vec<String>,

        /// Source types to keep (repeatable, comma separated)
        #[arg(long = "source-type")]
        source_types: Vec<String>,

        /// Custom field to match
        #[arg(long)]
        entity_name: Option<String>,

        /// Expected value of the custom field, `*` for any
        #[arg(long)]
        entity_id: Option<String>,
    },

    /// Inspect log files
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },
}

#[derive(Subcommand)]
enum LogsCommand {
    /// List log files in a directory
    List {
        /// Log directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Substrings every listed file name must contain
        #[arg(short, long, value_delimiter = ',')]
        filters: Vec<String>,
    },

    /// Print the last lines of a log file
    Tail {
        /// Log file
        #[arg(short, long)]
        file: PathBuf,

        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level)?;

    let config = load_config(cli.config.as_deref())?;

    let response = match cli.command {
        Commands::Events {
            file,
            severity_levels,
            source_types,
            entity_name,
            entity_id,
        } => {
            let query = EventQuery {
                severity_levels: non_empty(severity_levels),
                source_types: non_empty(source_types),
                entity_name,
                entity_id,
            };
            query_events(config, file, query).await?
        }
        Commands::Logs {
            command: LogsCommand::List { dir, filters },
        } => list_logs(config, dir, filters).await?,
        Commands::Logs {
            command: LogsCommand::Tail { file, lines },
        } => tail_log(config, &file, lines).await?,
    };

    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.result {
        anyhow::bail!("{}", response.msg);
    }

    Ok(())
}

fn setup_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<HeadConfig> {
    let config = match path {
        Some(path) => HeadConfig::from_yaml_file(path)?,
        None => HeadConfig::default(),
    };

    let config = config.with_env_overrides()?;
    debug!(?config, "Effective configuration");
    Ok(config)
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

async fn query_events(config: HeadConfig, file: PathBuf, query: EventQuery) -> Result<HeadResponse> {
    info!(file = %file.display(), "Querying cluster events");

    let head = StateHead::new(&config, Arc::new(JsonFileEventSource::new(&file)))?;
    Ok(HeadResponse::from_result(head.list_cluster_events(&query).await))
}

async fn list_logs(
    mut config: HeadConfig,
    dir: Option<PathBuf>,
    filters: Vec<String>,
) -> Result<HeadResponse> {
    if dir.is_some() {
        config.log_dir = dir;
    }

    let head = StateHead::new(&config, Arc::new(InMemoryEventSource::default()))?;
    Ok(HeadResponse::from_result(head.list_logs(&filters).await))
}

async fn tail_log(mut config: HeadConfig, file: &Path, lines: usize) -> Result<HeadResponse> {
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a log file path: {}", file.display()))?;
    let dir = file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    config.log_dir = Some(dir.to_path_buf());

    let head = StateHead::new(&config, Arc::new(InMemoryEventSource::default()))?;
    Ok(HeadResponse::from_result(head.tail_log(name, lines).await))
}
