//! Courier CLI - rate-limited bulk message delivery with envelope encryption
//!
//! This is the command-line interface for Courier. It wires the core job
//! manager to a config file, a key file and a data directory of targets and
//! messages.

mod app;
mod cli;
mod commands;
mod config;
mod logging;
mod ui;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;

use crate::cli::{Cli, Commands, KeysCommand};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = logging::level_for(
        app::configured_log_level(&cli).as_deref(),
        cli.verbose,
        cli.quiet,
    );
    let ansi = std::io::stderr().is_terminal()
        && !cli.no_color
        && std::env::var_os("NO_COLOR").is_none();
    logging::init(&level, ansi);

    match dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(app::exit_code(&err))
        }
    }
}

fn dispatch(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Init(args) => commands::init::handle_init(cli, args),
        Commands::Keys { command } => match command {
            KeysCommand::Generate(args) => commands::keys::handle_generate(cli, args),
            KeysCommand::Show(args) => commands::keys::handle_show(cli, args),
        },
        Commands::Run(args) => commands::run::handle_run(cli, args),
        Commands::Open(args) => commands::open::handle_open(cli, args),
        Commands::Doctor(args) => commands::doctor::handle_doctor(cli, args),
        Commands::Completions(args) => {
            commands::completions::handle_completions(args.shell);
            Ok(())
        }
    }
}
