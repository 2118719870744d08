//! Command-line interface definitions for the `stowage` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `stowage` binary.
#[derive(Debug, Parser)]
#[command(
    name = "stowage",
    about = "Verify storage credentials and probe cluster allocations",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Print the physical bucket name for a logical name.
    #[command(
        name = "bucket-name",
        about = "Print the physical bucket name for a logical name"
    )]
    BucketName(BucketNameCommand),
    /// Verify the configured S3 credentials against the vendor.
    #[command(
        name = "verify",
        about = "Verify the configured S3 credentials against the vendor"
    )]
    Verify(VerifyCommand),
    /// Query the health and build identifier of one allocation.
    #[command(
        name = "health",
        about = "Query the health and build identifier of one allocation"
    )]
    Health(HealthCommand),
}

/// Arguments for the `stowage bucket-name` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct BucketNameCommand {
    /// Logical name to hash (for example `session-7`).
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
}

/// Arguments for the `stowage verify` subcommand.
///
/// Secrets come from `STOWAGE_S3_*` variables or `stowage.toml` rather than
/// the command line.
#[derive(Debug, Parser)]
pub(crate) struct VerifyCommand {
    /// Override the configured S3 region.
    #[arg(long, value_name = "REGION")]
    pub(crate) region: Option<String>,
}

/// Arguments for the `stowage health` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct HealthCommand {
    /// Base URL of the allocation's control endpoint.
    #[arg(long, value_name = "URL")]
    pub(crate) endpoint: String,
}
