//! healwatchd — the healwatch daemon.
//!
//! Single binary that loads `healwatch.toml`, opens the incident store, and
//! runs the monitoring loop until Ctrl-C or SIGTERM. A few one-shot
//! subcommands cover config validation and incident inspection.
//!
//! # Usage
//!
//! ```text
//! healwatchd --config /etc/healwatch.toml run
//! healwatchd check-config
//! healwatchd incidents --service nginx --open
//! healwatchd probe nginx
//! ```

mod commands;
mod monitor;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,healwatch=debug,healwatchd=debug";

#[derive(Parser)]
#[command(name = "healwatchd", about = "Service health monitor with automated recovery")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "healwatch.toml")]
    config: PathBuf,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Monitor every configured service until interrupted.
    Run,

    /// Validate the configuration and print the service table.
    CheckConfig,

    /// Write a starter configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },

    /// Print incident history as JSON lines.
    ///
    /// The store file is locked while `healwatchd run` is active. Stop the
    /// daemon first, or point --config at a config whose store is a copy.
    Incidents {
        /// Only incidents for this service.
        #[arg(long)]
        service: Option<String>,

        /// Only incidents that are still open.
        #[arg(long)]
        open: bool,
    },

    /// Probe one service once and print the outcome. Touches no state.
    Probe {
        /// Service name as configured.
        name: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    // Logs go to stderr so subcommand output on stdout stays clean.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run => monitor::run(&cli.config).await,
        Command::CheckConfig => commands::check_config(&cli.config),
        Command::Init { force } => commands::init(&cli.config, force),
        Command::Incidents { service, open } => {
            commands::incidents(&cli.config, service.as_deref(), open)
        }
        Command::Probe { name } => commands::probe(&cli.config, &name).await,
    }
}
