mod cli;
mod commands;
mod config;
mod engine;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    log::debug!("drivesweep {} (verbosity {})", env!("CARGO_PKG_VERSION"), ctx.verbose);

    match cli.command {
        Commands::Sync(args) => commands::sync::run(&ctx, args),
        Commands::List(args) => commands::list::run(&ctx, args),
        Commands::Disk(args) => commands::disk::run(&ctx, args),
        Commands::Auth(cmd) => commands::auth::run(&ctx, cmd),
        Commands::Config(cmd) => commands::config::run(&ctx, cmd),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "drivesweep", &mut io::stdout());
            Ok(())
        }
    }
}
