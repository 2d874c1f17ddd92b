//! Binary entry point for the autoprune CLI.
//!
//! JSON envelopes go to stdout; logs and errors go to stderr.

mod cli;

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use autoprune::{
    Action, AutopruneConfig, ConfigError, HandlerError, RequestHandler, parse_action,
};
use cli::{Cli, Command};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Handler(#[from] HandlerError),
    #[error("refusing to delete volumes without --yes")]
    ConfirmationRequired,
    #[error("request failed with status {status}")]
    Rejected { status: u16 },
    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(&cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "autoprune=info".into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

/// Resolves the subcommand to an action before any configuration is read, so
/// invalid requests fail fast.
fn resolve_action(command: &Command) -> Result<Action, CliError> {
    match command {
        Command::Scan => Ok(Action::Scan),
        Command::Delete(args) if args.yes => Ok(Action::Delete),
        Command::Delete(_) => Err(CliError::ConfirmationRequired),
        Command::Handle(args) => Ok(parse_action(&args.body)?),
    }
}

fn apply_overrides(config: &mut AutopruneConfig, cli: &Cli) {
    if let Some(region) = &cli.region {
        config.region.clone_from(region);
    }
    if let Some(concurrency) = cli.max_delete_concurrency {
        config.max_delete_concurrency = concurrency;
    }
}

async fn dispatch(cli: &Cli) -> Result<(), CliError> {
    let action = resolve_action(&cli.command)?;

    let mut config = AutopruneConfig::load_without_cli_args()?;
    apply_overrides(&mut config, cli);
    let handler = RequestHandler::from_config(&config)?;

    let mut stdout = io::stdout();
    if let Command::Handle(args) = &cli.command {
        let reply = handler.handle_json(&args.body).await;
        writeln!(stdout, "{}", reply.body)?;
        if reply.status != 200 {
            return Err(CliError::Rejected {
                status: reply.status,
            });
        }
        return Ok(());
    }

    let response = handler.handle(action).await?;
    writeln!(stdout, "{}", serde_json::to_string_pretty(&response)?)?;
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
