//! Zeno CLI - hot-reload supervisor for compiled binaries
//!
//! Usage: zeno <COMMAND>

use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

/// BSD sysexits "internal software error", used for startup failures
const EXIT_SOFTWARE: i32 = 70;

fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    let result = match cli.command {
        Commands::Run { config } => commands::run::cmd_run(config.as_deref(), verbose),
        Commands::Init { force } => commands::init::cmd_init(force),
    };

    if let Err(err) = result {
        eprintln!("[zeno] [ERROR] {err:#}");
        std::process::exit(EXIT_SOFTWARE);
    }
}
