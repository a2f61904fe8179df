use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabula::{Config, ConnectionService, Value};

mod commands;

#[derive(Parser)]
#[command(name = "tabula")]
#[command(about = "Query SQLite and legacy Access databases from the command line")]
#[command(version)]
struct Cli {
    /// Configuration file (default: $TABULA_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty database (.db, .sqlite, .sqlite3, .mdb, .accdb)
    Create {
        /// Path of the new database file
        path: String,
    },
    /// Run a query and print the rows as JSON
    Query {
        /// Database file (empty string for an in-memory database)
        path: String,
        /// SQL statement, named parameters as :name
        sql: String,
        /// Named parameter as name=value (value parsed as JSON, else text)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,
    },
    /// Run a statement once per parameter set in a single transaction
    Update {
        /// Database file (empty string for an in-memory database)
        path: String,
        /// SQL statement, named parameters as :name
        sql: String,
        /// JSON array of parameter objects, e.g. '[{"id": 1}, {"id": 2}]'
        #[arg(long)]
        params: Option<String>,
    },
    /// Open a database and print its sidecar notes
    Notes {
        /// Database file
        path: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = Config::resolve(cli.config.as_deref()).context("Failed to load configuration")?;
    let validation = config.validate().context("Invalid configuration")?;
    for warning in &validation.warnings {
        tracing::warn!("{warning}");
    }
    let service = ConnectionService::new(&config);

    match cli.command {
        Commands::Create { path } => commands::create::execute(&service, &path),
        Commands::Query { path, sql, params } => {
            commands::query::execute(&service, &path, &sql, params.into_iter().collect())
        },
        Commands::Update { path, sql, params } => {
            commands::update::execute(&service, &path, &sql, params.as_deref())
        },
        Commands::Notes { path } => commands::notes::execute(&service, &path),
    }
}

/// Parses `name=value`, reading the value as JSON and falling back to text.
fn parse_param(raw: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim().trim_start_matches([':', '@', '$']);
    if name.is_empty() {
        return Err(format!("missing parameter name in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::Text(value.to_string()));
    Ok((name.to_string(), value))
}

/// Logs go to stderr so stdout carries only command output.
fn init_logging(json: bool) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}
