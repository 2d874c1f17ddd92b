//! Command-line interface definitions for the `autoprune` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Parser, Subcommand};

/// Top-level CLI for the `autoprune` binary.
#[derive(Debug, Parser)]
#[command(
    name = "autoprune",
    about = "Find and delete unattached Scaleway block-storage volumes",
    arg_required_else_help = true
)]
pub(crate) struct Cli {
    /// Operation to run.
    #[command(subcommand)]
    pub(crate) command: Command,
    /// Override the configured zone for this invocation.
    #[arg(long, global = true, value_name = "ZONE")]
    pub(crate) region: Option<String>,
    /// Override how many deletes may run at once.
    #[arg(
        long,
        global = true,
        value_name = "N",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub(crate) max_delete_concurrency: Option<u32>,
}

/// Subcommands of `autoprune`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List zombie volumes and their monthly cost without deleting anything.
    #[command(name = "scan", about = "List zombie volumes and their monthly cost")]
    Scan,
    /// Re-scan and delete every zombie volume.
    #[command(name = "delete", about = "Re-scan and delete every zombie volume")]
    Delete(DeleteCommand),
    /// Handle a raw action endpoint body such as `{"action":"scan"}`.
    #[command(name = "handle", about = "Handle a raw action endpoint JSON body")]
    Handle(HandleCommand),
}

/// Arguments for the `autoprune delete` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DeleteCommand {
    /// Confirm that zombie volumes should be deleted. Deletion is
    /// irreversible, so the command refuses to run without this flag.
    #[arg(long)]
    pub(crate) yes: bool,
}

/// Arguments for the `autoprune handle` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct HandleCommand {
    /// JSON request body; an empty body selects `scan`.
    #[arg(value_name = "JSON", default_value = "")]
    pub(crate) body: String,
}
