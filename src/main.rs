use std::path::PathBuf;

use autodiag::Result;
use autodiag::commands::{diagnose, ingest, show_config, status};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "autodiag")]
#[command(about = "Automotive fault diagnosis assistant backed by indexed workshop manuals")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a directory of plain-text workshop manuals
    Ingest {
        /// Directory containing .txt manual files
        dir: PathBuf,
    },
    /// Diagnose a fault from a symptom description
    Diagnose {
        /// Observed symptom, at least 10 characters
        #[arg(long)]
        symptom: String,
        /// Vehicle make, model and year
        #[arg(long)]
        vehicle: String,
    },
    /// Show the active configuration
    Config,
    /// Show configuration and index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest { dir } => {
            ingest(dir).await?;
        }
        Commands::Diagnose { symptom, vehicle } => {
            diagnose(symptom, vehicle).await?;
        }
        Commands::Config => {
            show_config()?;
        }
        Commands::Status => {
            status().await?;
        }
    }

    Ok(())
}
