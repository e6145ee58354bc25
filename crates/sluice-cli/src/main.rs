use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "sluice", version, about = "Sluice data API engine tools")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the statement a request document compiles to, without a database.
    Explain {
        /// Target table, "table" or "schema.table".
        #[arg(long)]
        table: String,

        /// JSON request document tagged by "operation".
        #[arg(long)]
        request: PathBuf,

        /// Table metadata (output of `sluice introspect`) used for typed casts.
        #[arg(long)]
        meta: Option<PathBuf>,

        /// Configuration file supplying guardrails.
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print table metadata read from the database as JSON.
    Introspect {
        #[arg(long, short = 'c', default_value = "sluice.yaml", env = "SLUICE_CONFIG")]
        config: PathBuf,

        /// Schema to include. Repeatable; all user schemas when omitted.
        #[arg(long = "schema")]
        schemas: Vec<String>,
    },

    /// Load and validate a configuration file.
    Check {
        #[arg(long, short = 'c', default_value = "sluice.yaml", env = "SLUICE_CONFIG")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Explain {
            table,
            request,
            meta,
            config,
        } => commands::explain::run(&table, &request, meta.as_deref(), config.as_deref()),
        Command::Introspect { config, schemas } => commands::introspect::run(&config, &schemas).await,
        Command::Check { config } => commands::check::run(&config),
    }
}
