//! aqua-verify: verify an exported revision chain.
//!
//! Walks the chain from genesis, printing one line per revision as it is
//! verified, then the aggregate status. Exit code 0 for `VERIFIED`, 1 for
//! `INVALID`, 2 for `NORECORD`.

mod report;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use aqua_verifier::{RevisionVerificationApi, VerificationService, WalkOptions};
use clap::Parser;
use shared_types::ExportedChain;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use report::{exit_code, ConsoleReporter};

/// aqua-verify: verify an exported revision chain
#[derive(Parser, Debug)]
#[command(name = "aqua-verify")]
#[command(about = "Verify hashes, signatures and witnesses of a revision chain")]
#[command(version)]
struct Args {
    /// Exported chain (JSON)
    file: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip the rigorous Merkle proof check on witnesses
    #[arg(long)]
    ignore_merkle_proof: bool,

    /// Log every individual check
    #[arg(short, long)]
    verbose: bool,

    /// Print the full result as JSON instead of report lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args).await {
        Ok(code) => Ok(code),
        Err(e) => {
            error!(error = %e, "[aqua] Verification aborted");
            Err(e)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = std::env::var("AQUA_LOG_LEVEL")
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: &Args) -> Result<ExitCode> {
    let config = settings::load_config(args.config.as_deref())?;
    let options = WalkOptions {
        verify_merkle_proof: config.walk.verify_merkle_proof && !args.ignore_merkle_proof,
        verbose: config.walk.verbose || args.verbose,
    };

    let chain = ExportedChain::load(&args.file)
        .with_context(|| format!("loading chain {}", args.file.display()))?;
    let tip = chain
        .tip()
        .map(|(hash, _)| shared_types::Revision::short_hash(hash).to_string())
        .unwrap_or_default();
    info!(
        file = %args.file.display(),
        revisions = chain.len(),
        %tip,
        "[aqua] Loaded chain"
    );

    let mut service = VerificationService::from_config(&config)?;
    if !args.json {
        service = service.with_reporter(Arc::new(ConsoleReporter::default()));
    }

    let result = service.verify_chain(&chain, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.summary());
    }
    Ok(exit_code(&result))
}
