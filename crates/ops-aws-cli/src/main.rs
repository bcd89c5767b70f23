//! ops-aws
//!
//! Query RDS cluster endpoints, decrypt KMS blobs and read SSM parameters
//! from the command line. Output is the raw JSON (or plaintext) on stdout.
//!
//! # Usage
//! ```bash
//! # Writer endpoint of one cluster
//! ops-aws rds endpoint --cluster orders-db
//!
//! # Reader endpoint behind every instance
//! ops-aws rds endpoints --type reader
//!
//! # Instance identifiers and creation times
//! ops-aws rds list
//!
//! # Decrypt a blob produced by `aws kms encrypt`
//! ops-aws kms decrypt --data AQICAHh...
//!
//! # Parameter Store
//! ops-aws ssm describe --filter Type=SecureString
//! ops-aws ssm path --path /orders/db
//! ```

use clap::Parser;
use env_logger::Env;
use ops_aws::{AwsServices, OpsResult, SdkConfig};
use std::io::Write;
use std::process::ExitCode;

mod commands;

use commands::{Command, Handlers};

#[derive(Parser)]
#[command(name = "ops-aws")]
#[command(about = "Thin AWS lookups for RDS, KMS and SSM", long_about = None)]
#[command(version)]
struct Cli {
    /// AWS region
    #[arg(long, env = "AWS_REGION", global = true)]
    region: Option<String>,

    /// Endpoint override for every service (e.g. LocalStack)
    #[arg(long, env = "AWS_ENDPOINT_URL", global = true)]
    endpoint_url: Option<String>,

    /// Shared credentials profile
    #[arg(long, env = "AWS_PROFILE", global = true)]
    profile: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Resolve configuration, letting flags stand in for their variables.
    fn sdk_config(&self) -> OpsResult<SdkConfig> {
        SdkConfig::resolve(&|key| {
            let flag = match key {
                "AWS_REGION" => self.region.clone(),
                "AWS_ENDPOINT_URL" => self.endpoint_url.clone(),
                "AWS_PROFILE" => self.profile.clone(),
                _ => None,
            };
            flag.or_else(|| std::env::var(key).ok())
        })
    }
}

async fn run(cli: Cli) -> OpsResult<Vec<u8>> {
    let services = AwsServices::from_config(&cli.sdk_config()?)?;
    let handlers = Handlers {
        rds: &services.rds,
        kms: &services.kms,
        ssm: &services.ssm,
    };
    commands::execute(cli.command, &handlers).await
}

fn emit(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.write_all(b"\n")?;
    stdout.flush()
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::init_from_env(Env::default().default_filter_or(level));

    match run(cli).await {
        Ok(bytes) => match emit(&bytes) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("unable to write output: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
