//! histscope: workflow history analysis from the command line.

mod cli;
mod commands;
mod state;

use clap::Parser;
use cli::{Cli, Command};
use hs_analysis::CancellationToken;
use state::AppState;
use std::process::ExitCode;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    match run(cli, &cancel).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> anyhow::Result<String> {
    let state = AppState::open(cli.db, cli.config)?;
    match cli.command {
        Command::Timeline(args) => {
            commands::timeline::run(&state, &cli.namespace, cli.format, args, cancel).await
        }
        Command::Trace(args) => {
            commands::trace::run(&state, &cli.namespace, cli.format, args, cancel).await
        }
        Command::Failures(args) => {
            commands::failures::run(&state, &cli.namespace, cli.format, args, cancel).await
        }
        Command::Import(args) => commands::import::run(&state, args),
    }
}
