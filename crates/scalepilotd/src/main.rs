//! scalepilotd: run one target call from the command line.
//!
//! Loads the flat configuration map from a TOML file and `--set`
//! overrides, runs the call, and prints the result as JSON on stdout.
//! Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! scalepilotd info
//! scalepilotd status -c pool.toml
//! scalepilotd scale -c pool.toml --direction up --count 5
//! scalepilotd scale -c pool.toml --set zone=nl-ams-1 --direction down --count 2 --dry-run
//! ```

mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use scalepilot_core::ScaleDirection;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scalepilotd", about = "Scaleway autoscaling target", version)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Default)]
struct ConfigArgs {
    /// TOML file holding the configuration map.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override a configuration key. May be repeated.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the target's identity.
    Info,

    /// Report pool readiness and instance count.
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Move the pool toward a desired instance count.
    Scale {
        #[command(flatten)]
        config: ConfigArgs,

        /// Scaling direction: up, down, or none.
        #[arg(long)]
        direction: ScaleDirection,

        /// Desired total instance count.
        #[arg(long)]
        count: i64,

        /// Only report what would happen.
        #[arg(long)]
        dry_run: bool,

        /// Free-form reason recorded in the logs.
        #[arg(long, default_value = "")]
        reason: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scalepilot=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Info => commands::info(),
        Command::Status { config } => commands::status(&config).await,
        Command::Scale {
            config,
            direction,
            count,
            dry_run,
            reason,
        } => {
            let action = commands::scaling_action(direction, count, dry_run, reason);
            commands::scale(&config, action).await
        }
    }
}
