//! cellheap - CLI

use anyhow::{Context, Result};
use cellheap::util::config::load_user_config;
use cellheap::util::logger;
use cellheap::{demo, run_file, run_with_config, NAME, VERSION};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Explicit free-list heap manager demonstration driver
#[derive(Parser, Debug)]
#[command(name = "cellheap")]
#[command(version = VERSION)]
#[command(about = "Explicit free-list heap manager over integer cells", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a trace script
    Run {
        /// Script file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Evaluate trace commands from the command line
    Eval {
        /// Commands to evaluate, one per line
        #[arg(value_name = "CODE")]
        code: String,
    },

    /// Replay the built-in demonstration sequence
    Demo,

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_user_config().unwrap_or_default();

    if args.verbose || config.log.verbose {
        logger::init_debug();
    } else {
        logger::init_cli();
    }

    match args.command {
        Commands::Run { file } => {
            run_file(&file).with_context(|| format!("Failed to run: {}", file.display()))?;
        }
        Commands::Eval { code } => {
            run_with_config(&code, &config).context("Failed to evaluate trace")?;
        }
        Commands::Demo => {
            demo()?;
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}
