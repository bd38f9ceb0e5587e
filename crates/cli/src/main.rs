use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sift", version, about = "Validate and categorize bank CSV exports")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a profile and print the category evaluation order
    Check { profile: PathBuf },
    /// Parse an export and print the categorized rows
    Parse {
        profile: PathBuf,
        file: PathBuf,
        /// Report every invalid row instead of stopping at the first
        #[arg(long, conflicts_with = "stage")]
        collect_errors: bool,
        /// Print the preview as JSON
        #[arg(long)]
        json: bool,
        /// Write the staged rows to this CSV file
        #[arg(long)]
        stage: Option<PathBuf>,
    },
    /// Recompute categories for stored transactions (JSON array)
    Recategorize {
        profile: PathBuf,
        transactions: PathBuf,
        /// Rewrite the transactions file with the changes applied
        #[arg(long)]
        write: bool,
    },
}

fn main() {
    // stdout carries results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { profile } => commands::check(&profile),
        Commands::Parse {
            profile,
            file,
            collect_errors,
            json,
            stage,
        } => commands::parse(&profile, &file, collect_errors, json, stage.as_deref()),
        Commands::Recategorize {
            profile,
            transactions,
            write,
        } => commands::recategorize(&profile, &transactions, write),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
