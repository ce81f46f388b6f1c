// DeepMDP control CLI
// Validate and inspect experiment configuration documents

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "deepmdpctl")]
#[command(about = "Validate and inspect DeepMDP experiment configurations", version)]
struct Cli {
    /// Log loader diagnostics to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a document and report every problem
    Validate {
        /// Experiment document
        file: PathBuf,
    },

    /// Print the Q-network layer plan
    Layers {
        /// Experiment document
        file: PathBuf,

        /// Append the action-value layer for this many actions
        #[arg(short, long)]
        actions: Option<usize>,
    },

    /// List the epochs that are snapshotted
    Snapshots {
        /// Experiment document
        file: PathBuf,

        /// Run length in epochs (defaults to n_epochs)
        #[arg(short, long)]
        epochs: Option<usize>,
    },

    /// Print the first values of the epsilon decay
    Epsilon {
        /// Experiment document
        file: PathBuf,

        /// Initial epsilon, when the document has no max_epsilon
        #[arg(long)]
        initial: Option<f64>,

        /// Epsilon floor, only together with --initial
        #[arg(long, requires = "initial")]
        floor: Option<f64>,

        /// Number of values to print
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Re-serialize the validated document as pretty JSON
    Dump {
        /// Experiment document
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Validate { file } => {
            commands::validate(&file)?;
        }

        Commands::Layers { file, actions } => {
            commands::layers(&file, actions)?;
        }

        Commands::Snapshots { file, epochs } => {
            commands::snapshots(&file, epochs)?;
        }

        Commands::Epsilon {
            file,
            initial,
            floor,
            count,
        } => {
            commands::epsilon(&file, initial, floor, count)?;
        }

        Commands::Dump { file } => {
            commands::dump(&file)?;
        }
    }

    Ok(())
}
