// SPDX-License-Identifier: Apache-2.0

//! querybench CLI
//!
//! Command-line driver for the SQL strategy benchmark. Owns the lifecycle
//! of the configuration, the two record stores and the scheduler.

use clap::{Parser, Subcommand};
use querybench_core::BenchResult;

mod commands;

/// querybench - compares a reused raw connection against a pooled checkout
#[derive(Parser)]
#[command(name = "querybench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "querybench.yaml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark
    Run,

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },

    /// Create and populate the benchmark database
    Seed {
        /// Number of rows to seed
        #[arg(long, default_value_t = 10_000)]
        rows: u32,
    },
}

fn main() -> BenchResult<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Run => commands::run::execute(&cli.config),
        Commands::Validate { file } => commands::validate::execute(&file),
        Commands::Seed { rows } => commands::seed::execute(&cli.config, rows),
    }
}
