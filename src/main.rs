//! Binary entry point for the Stowage CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use stowage::{
    ControlChannel, ControlError, ConvertError, HttpControlChannel, Provider, S3Verifier,
    SessionId, StowageConfig, VendorError, VendorVerifier, Verdict, bucket_name, convert,
};

mod cli;

use cli::{BucketNameCommand, Cli, HealthCommand, VerifyCommand};

/// Environment variable holding the `tracing` filter directive.
const LOG_ENV_VAR: &str = "STOWAGE_LOG";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("credentials error: {0}")]
    Credentials(#[from] ConvertError),
    #[error("verification failed: {0}")]
    Vendor(#[from] VendorError),
    #[error("control call failed: {0}")]
    Control(#[from] ControlError),
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli, &mut io::stdout()).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli, out: &mut impl Write) -> Result<i32, CliError> {
    match cli {
        Cli::BucketName(command) => print_bucket_name(&command, out),
        Cli::Verify(command) => {
            let config = load_config()?;
            verify_credentials(&config, &command, &S3Verifier::new(), out).await
        }
        Cli::Health(command) => {
            let config = load_config()?;
            probe_health(&config, &command, out).await
        }
    }
}

fn load_config() -> Result<StowageConfig, CliError> {
    StowageConfig::load_without_cli_args()
        .map_err(|err| CliError::Config(err.to_string()))
        .and_then(validated)
}

fn validated(config: StowageConfig) -> Result<StowageConfig, CliError> {
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    Ok(config)
}

fn print_bucket_name(command: &BucketNameCommand, out: &mut impl Write) -> Result<i32, CliError> {
    writeln!(out, "{}", bucket_name(&command.name))?;
    Ok(0)
}

async fn verify_credentials(
    config: &StowageConfig,
    command: &VerifyCommand,
    verifier: &impl VendorVerifier,
    out: &mut impl Write,
) -> Result<i32, CliError> {
    let mut config = config.clone();
    if let Some(region) = &command.region {
        config.s3_region.clone_from(region);
    }
    let payload = config
        .s3_credentials_payload()
        .map_err(|err| CliError::Config(err.to_string()))?;
    let credentials = convert(Provider::S3, SessionId::new(0), Some(&payload))?;

    match verifier.verify(&credentials.external).await? {
        Verdict::Valid => {
            writeln!(out, "valid")?;
            Ok(0)
        }
        Verdict::Invalid { reason } => {
            writeln!(out, "invalid: {reason}")?;
            Ok(2)
        }
    }
}

async fn probe_health(
    config: &StowageConfig,
    command: &HealthCommand,
    out: &mut impl Write,
) -> Result<i32, CliError> {
    let channel = HttpControlChannel::new(&command.endpoint, config.control_timeout())?;
    let healthy = channel.health_check().await?;
    let version = channel.version().await?;

    writeln!(out, "healthy: {healthy}")?;
    writeln!(out, "version: {version}")?;
    let compatible = version == config.expected_build.trim();
    if !compatible {
        writeln!(out, "expected version: {}", config.expected_build.trim())?;
    }
    Ok(if healthy && compatible { 0 } else { 2 })
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
