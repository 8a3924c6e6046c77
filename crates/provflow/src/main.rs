mod backend;
mod commands;
mod observer;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use provflow_config::BackendKind;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "provflow")]
#[command(about = "Keep applying until the instance exists.", long_about = None)]
struct Cli {
    /// Debug logging, including every line of apply output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the configuration, retrying capacity failures until it succeeds
    Apply(ApplyArgs),
    /// Classify a saved apply log (file or stdin)
    Classify {
        /// Log file; reads stdin when omitted
        file: Option<PathBuf>,
        /// Settings file whose extra classifier markers apply
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show version information
    Version,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Settings file (skips discovery)
    #[arg(short, long, env = "PROVFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Back-end to drive: terraform or job
    #[arg(short, long, env = "PROVFLOW_BACKEND")]
    pub backend: Option<BackendKind>,

    /// Seconds to wait between attempts
    #[arg(short, long, env = "PROVFLOW_INTERVAL", value_name = "SECS")]
    pub interval: Option<u64>,

    /// terraform configuration directory
    #[arg(long, env = "PROVFLOW_TERRAFORM_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Stack OCID for the job back-end
    #[arg(long, env = "PROVFLOW_STACK_ID")]
    pub stack_id: Option<String>,

    /// Write the session record as JSON when the run ends
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Apply(args) => commands::apply::handle(args).await,
        Commands::Classify { file, config } => {
            commands::classify::handle(file.as_deref(), config.as_deref())
        }
        Commands::Version => {
            println!("provflow {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(commands::EXIT_ERROR)
        }
    }
}
