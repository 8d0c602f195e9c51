//! tagsync CLI
//!
//! Scans a music collection into an editable snapshot and applies edited
//! snapshots back to the files on disk.

mod cli;
mod commands;
mod config;
mod context;
mod error;

use std::path::Path;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cli::{Cli, Commands};
use config::Overrides;
use context::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command.clone() else {
        // No command provided - show help hint
        println!("{} Music collection snapshot sync", "tagsync".green().bold());
        println!();
        println!("Run {} for available commands.", "tagsync --help".cyan());
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        clap_complete::generate(shell, &mut Cli::command(), "tagsync", &mut std::io::stdout());
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let ctx = load_context(&cwd, &cli)?;
    execute_command(&ctx, command)
}

fn init_tracing(verbose: bool) {
    // Logs go to stderr so stdout stays parseable (e.g. `apply --json`)
    let installed = if verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber).is_ok()
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    };
    if installed && verbose {
        tracing::debug!("Verbose mode enabled");
    }
}

fn load_context(cwd: &Path, cli: &Cli) -> Result<Context> {
    let settings = config::resolve(
        cwd,
        Overrides {
            config: cli.config.as_deref(),
            music_root: cli.music_root.as_deref(),
            snapshot_root: cli.snapshot_root.as_deref(),
        },
    )?;
    tracing::debug!(?settings, "resolved settings");
    Context::new(settings)
}

fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Scan => commands::run_scan(ctx),
        Commands::Update => commands::run_update(ctx),
        Commands::Apply { dry_run, json } => commands::run_apply(ctx, dry_run, json),
        Commands::Diff => commands::run_diff(ctx),
        Commands::Recover => commands::run_recover(ctx),
        // Handled before settings are resolved
        Commands::Completions { .. } => Ok(()),
    }
}
