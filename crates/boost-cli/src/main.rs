use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::debug;

use boost_core::{
    BoostError, DirectoryHasher, ErrorCode, KeyDerivationEngine, KeyResult, MeasurementEngine,
    MeasurementMode, MeasurementResult, QuoteResult,
};
use boost_tdx::{connect, TEST_MODE_ENV};

mod config;

use config::{BoostConfig, Overrides, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "boost",
    version,
    about = "Measure application volumes into TDX and derive attested Ethereum keys"
)]
struct Cli {
    /// Use the in-memory mock instead of the TDX guest device
    #[arg(long, global = true)]
    mock: bool,

    /// Path to a boost.toml configuration file
    #[arg(long, global = true, env = "BOOST_CONFIG")]
    config: Option<PathBuf>,

    /// Directory relative volume paths are resolved against
    #[arg(long, global = true, env = "BOOST_BASE_DIR")]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Hash a directory tree
    HashDir { path: PathBuf },

    /// Compute the volumes hash of a compose manifest without binding it
    VolumesHash { manifest: PathBuf },

    /// Measure a compose manifest and bind the result
    Start {
        manifest: PathBuf,

        #[arg(long, value_enum, default_value_t = ModeArg::ReportData)]
        mode: ModeArg,

        /// RTMR to extend in rtmr mode
        #[arg(long)]
        rtmr: Option<u8>,
    },

    /// Produce a quote over up to 64 bytes of hex-encoded data
    Quote {
        #[arg(long)]
        extra_data: Option<String>,
    },

    /// Derive the Ethereum address bound to this guest
    Derive,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    ReportData,
    Rtmr,
}

impl From<ModeArg> for MeasurementMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::ReportData => MeasurementMode::ReportData,
            ModeArg::Rtmr => MeasurementMode::Rtmr,
        }
    }
}

/// `hash-dir` output.
#[derive(Debug, Serialize)]
struct DigestResult {
    status: ErrorCode,
    message: String,
    digest: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let status = run(cli)?;
    if !status.is_success() {
        std::process::exit(status.as_i32().abs());
    }
    Ok(())
}

fn run(cli: Cli) -> Result<ErrorCode> {
    let file = cli
        .config
        .as_deref()
        .map(BoostConfig::from_file)
        .transpose()?;
    let rtmr = match &cli.command {
        Command::Start { rtmr, .. } => *rtmr,
        _ => None,
    };
    let flags = Overrides {
        mock: cli.mock,
        base_dir: cli.base_dir.clone(),
        rtmr,
    };
    let test_mode = std::env::var(TEST_MODE_ENV).ok();
    let cwd = std::env::current_dir().context("resolving the working directory")?;
    let settings = Settings::resolve(&flags, test_mode.as_deref(), file.as_ref(), cwd);
    debug!(?settings, "settings resolved");

    match cli.command {
        Command::HashDir { path } => {
            let result = match DirectoryHasher::new().hash(&path) {
                Ok(digest) => DigestResult {
                    status: ErrorCode::Success,
                    message: "ok".into(),
                    digest: Some(hex::encode(digest)),
                },
                Err(e) => DigestResult {
                    status: e.code(),
                    message: e.to_string(),
                    digest: None,
                },
            };
            emit(&result, result.status)
        }
        Command::VolumesHash { manifest } => {
            let engine = MeasurementEngine::new(connect(&settings.attestation), &settings.base_dir);
            let result = MeasurementResult::from(
                read_manifest(&manifest).and_then(|m| engine.calculate_volumes_hash(&m)),
            );
            emit(&result, result.status)
        }
        Command::Start { manifest, mode, .. } => {
            let mut engine =
                MeasurementEngine::new(connect(&settings.attestation), &settings.base_dir);
            let result = MeasurementResult::from(
                read_manifest(&manifest)
                    .and_then(|m| engine.start(&m, mode.into(), settings.rtmr)),
            );
            emit(&result, result.status)
        }
        Command::Quote { extra_data } => {
            let engine = MeasurementEngine::new(connect(&settings.attestation), &settings.base_dir);
            let result = QuoteResult::from(
                decode_extra_data(extra_data.as_deref())
                    .and_then(|data| engine.generate_quote(&data)),
            );
            emit(&result, result.status)
        }
        Command::Derive => {
            let mut engine = KeyDerivationEngine::new(connect(&settings.attestation));
            let result = KeyResult::from(engine.derive());
            emit(&result, result.status)
        }
    }
}

fn emit<T: Serialize>(result: &T, status: ErrorCode) -> Result<ErrorCode> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(status)
}

fn read_manifest(path: &Path) -> boost_core::Result<String> {
    std::fs::read_to_string(path).map_err(|e| BoostError::io(path, e))
}

fn decode_extra_data(text: Option<&str>) -> boost_core::Result<Vec<u8>> {
    let Some(text) = text else {
        return Ok(Vec::new());
    };
    let digits = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(digits).map_err(|e| BoostError::InvalidParam(format!("extra data: {}", e)))
}
