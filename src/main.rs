mod cli;
mod commands;
mod loader;
mod paths;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use resolver::LoadOptions;
use std::io;
use std::path::PathBuf;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub config: Option<PathBuf>,
    pub options: LoadOptions,
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
        quiet: cli.quiet,
        config: cli.config,
        options: LoadOptions {
            update: cli.update,
            with_global: cli.with_global,
        },
    };

    match cli.command {
        Command::Hosts(args) => commands::hosts::run(&ctx, &args),
        Command::Tasks(args) => commands::tasks::run(&ctx, &args),
        Command::Jobs => commands::jobs::run(&ctx),
        Command::Show { kind, name } => commands::show::run(&ctx, kind, &name),
        Command::Registry => commands::registry::run(&ctx),
        Command::Modules => commands::modules::run(&ctx),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "essh", &mut io::stdout());
            Ok(())
        }
    }
}
