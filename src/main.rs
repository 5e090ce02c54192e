//! OHL pattern backtest - main entry point
//!
//! This binary provides two subcommands:
//! - analyze: Backtest every pattern row in a CSV and write the report
//! - bars: Print the daily bars fetched around one symbol/date

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ohl_backtest::Config;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "ohl-backtest")]
#[command(about = "Backtest open-equals-low pattern signals against daily bars", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Backtest pattern occurrences from a CSV file
    Analyze {
        /// Input CSV with symbol and date columns
        #[arg(short, long)]
        input: PathBuf,

        /// Output path for the text report
        #[arg(short, long, default_value = "ohl_backtest_report.txt")]
        output: PathBuf,

        /// Also write per-trade rows to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Maximum concurrent fetches (overrides config file)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Forward window in trading days (overrides config file)
        #[arg(long)]
        holding_days: Option<usize>,
    },

    /// Show the daily bars fetched around a pattern date
    Bars {
        /// Trading symbol, e.g. SBIN
        #[arg(short, long)]
        symbol: String,

        /// Pattern date (YYYY-MM-DD or DD-MM-YYYY)
        #[arg(short, long)]
        date: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str, log_dir: &Path, file_only: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    // {command}_{timestamp}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = log_dir.join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never(log_dir, &log_filename);

    if file_only {
        // Keep the console clean for the progress bar
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    } else {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();
    }

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let (command_name, file_only) = match &cli.command {
        Commands::Analyze { .. } => ("analyze", config.pipeline.show_progress),
        Commands::Bars { .. } => ("bars", false),
    };

    setup_logging(
        cli.verbose,
        command_name,
        Path::new(&config.logging.log_dir),
        file_only,
    )?;
    if let Some(path) = &cli.config {
        info!("Loaded configuration from: {}", path);
    }

    match cli.command {
        Commands::Analyze {
            input,
            output,
            csv,
            concurrency,
            holding_days,
        } => commands::analyze::run(config, input, output, csv, concurrency, holding_days),

        Commands::Bars { symbol, date } => commands::bars::run(config, symbol, date),
    }
}
