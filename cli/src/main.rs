//! CWP Report CLI
//!
//! Command-line interface for cloud workload protection reports.
//!
//! # Usage
//!
//! ```bash
//! cwpreport report waas
//! cwpreport report all --sink json --raw-dump ./raw
//! cwpreport rules generate --from-file profiles.json
//! cwpreport rules push --dry-run
//! cwpreport config set console_path https://europe-west3.cloud.twistlock.com/eu-123
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

#[derive(Parser)]
#[command(name = "cwpreport")]
#[command(version)]
#[command(about = "Cloud workload protection report generator", long_about = None)]
struct Cli {
    /// Console base URL
    #[arg(long, env = "CONSOLE_PATH")]
    console_path: Option<String>,

    /// Pre-encoded basic credential
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Console API version
    #[arg(long, env = "API_VERSION")]
    api_version: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    format: output::OutputFormat,

    /// Profile name from config file
    #[arg(long, short)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate reports
    Report {
        #[arg(value_enum)]
        target: ReportTarget,

        #[command(flatten)]
        options: ReportOptions,
    },
    /// Runtime rules from learned container models
    Rules {
        #[command(subcommand)]
        action: RuleCommands,
    },
    /// Configure CLI
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportTarget {
    Waas,
    Runtime,
    Containers,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkFormat {
    Csv,
    Json,
}

#[derive(Args)]
struct ReportOptions {
    /// Directory receiving report files
    #[arg(long, short)]
    output_dir: Option<PathBuf>,

    /// Report file format
    #[arg(long, value_enum, default_value = "csv")]
    sink: SinkFormat,

    /// Also write the raw events to this directory
    #[arg(long)]
    raw_dump: Option<PathBuf>,

    /// Abort on the first malformed record
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct RuleSource {
    /// Read container models from a JSON file instead of the console
    #[arg(long)]
    from_file: Option<PathBuf>,

    /// Owner stamped on the rules
    #[arg(long)]
    owner: Option<String>,
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Print or save the generated runtime policy
    Generate {
        #[command(flatten)]
        source: RuleSource,

        /// Write the policy to a file
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Create collections and replace the runtime policy on the console
    Push {
        #[command(flatten)]
        source: RuleSource,

        /// Print the policy JSON without sending anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set configuration value
    Set { key: String, value: String },
    /// Get configuration value
    Get { key: String },
    /// List all configuration
    List,
    /// Initialize configuration
    Init,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        console_path,
        token,
        api_version,
        format,
        profile,
        command,
    } = cli;
    let profile = profile.as_deref();
    let overrides = commands::Overrides {
        console_path,
        token,
        api_version,
    };

    match command {
        Commands::Report { target, options } => {
            let ctx = commands::Context::load(overrides, profile, format)?;
            commands::report::handle(target, options, &ctx).await
        }
        Commands::Rules { action } => {
            let ctx = commands::Context::load(overrides, profile, format)?;
            commands::rules::handle(action, &ctx).await
        }
        Commands::Config { action } => commands::config::handle(action, profile, format),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
