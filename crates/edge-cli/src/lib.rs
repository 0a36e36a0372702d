pub mod cli;
pub mod commands;

use clap::Parser;
use cli::Edge;
use commands::handle_command;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "EDGE_LOG";

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Run the edge CLI application
pub fn run_main() {
    let args = Edge::parse();
    setup_tracing(args.verbose);

    if let Err(e) = handle_command(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
