mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::cap_table::CapTableArgs;
use commands::note::ConvertNoteArgs;
use commands::scenarios::CompareArgs;

/// Priced-round cap tables with convertible notes and option-pool top-ups
#[derive(Parser)]
#[command(
    name = "captable",
    version,
    about = "Priced-round cap tables with convertible notes and option-pool top-ups",
    long_about = "Solves the share price of a priced financing round in which convertible \
                  notes convert and the option pool is topped up to a post-money target, \
                  then prints the pro-forma cap table with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins if set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a priced round and print the pro-forma cap table
    CapTable(CapTableArgs),
    /// Convert a single note at a given share price
    ConvertNote(ConvertNoteArgs),
    /// Compare several deal scenarios side by side
    Compare(CompareArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::CapTable(args) => commands::cap_table::run_cap_table(args),
        Commands::ConvertNote(args) => commands::note::run_convert_note(args),
        Commands::Compare(args) => commands::scenarios::run_compare(args),
        Commands::Version => {
            println!("captable {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
