//! Replica Pairing CLI
//!
//! One reconciliation pass per invocation:
//!
//! ```text
//! replica-pairing --usage failover      # EmcSrdfSraTestFailoverConfig.xml
//! replica-pairing --usage maskinginfo   # EmcSrdfSraMaskingInfo.xml + AllMaskingDevices.txt
//! ```
//!
//! Endpoints, credentials and copy settings come from the YAML file named
//! by `REPLICA_PAIRING_CONFIG` (default `replica-pairing.yaml`).

use clap::{Parser, ValueEnum};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use replica_pairing::{
    Error, ExportWriter, HttpInventoryClient, InventoryClient, PairingConfig, ReconcileEngine,
    Result, UsageMode, WbemClient,
};

// =============================================================================
// CLI Arguments
// =============================================================================

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Usage {
    /// Pair presented targets and write the test failover configuration
    Failover,
    /// Pair unpresented targets and write the masking configuration
    #[value(name = "maskinginfo")]
    MaskingInfo,
}

impl From<Usage> for UsageMode {
    fn from(usage: Usage) -> Self {
        match usage {
            Usage::Failover => UsageMode::Failover,
            Usage::MaskingInfo => UsageMode::Masking,
        }
    }
}

/// Replica Pairing - pair replication volumes and export adapter configuration
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Which configuration to generate
    #[arg(long, value_enum)]
    usage: Usage,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match PairingConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let config = apply_args(&args, config);
    init_logging(config.diagnostics_enabled, config.log_json);

    match run(args.usage.into(), &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(mode: UsageMode, config: &PairingConfig) -> Result<()> {
    info!("Starting {} v{}", replica_pairing::NAME, replica_pairing::VERSION);
    info!("  Inventory: {}", config.inventory_endpoint);
    info!("  Array provider: {}", config.array_endpoint);

    let inventory = Arc::new(HttpInventoryClient::new(config.inventory_client_config())?);
    let array = Arc::new(WbemClient::new(config.wbem_config())?);
    let engine = ReconcileEngine::new(config.engine_config(), inventory.clone(), array);

    let result = engine.run(mode).await;
    if let Err(e) = inventory.disconnect().await {
        warn!("Failed to close inventory session: {}", e);
    }
    let report = result?;

    let writer = ExportWriter::new(&config.output_directory);
    if mode == UsageMode::Masking {
        writer.write_device_list(&report).await?;
    }

    if !report.is_success() {
        return Err(Error::PairingFailed(report.outcome.to_string()));
    }

    match mode {
        UsageMode::Failover => writer.write_failover(&report, &config.copy_settings()).await?,
        UsageMode::Masking => writer.write_masking(&report).await?,
    };

    info!(
        "Run complete: {} pairs ({} already on the array)",
        report.pairs.len(),
        report.discovered
    );
    Ok(())
}

/// `--debug` doubles as the stale-data override
fn apply_args(args: &Args, mut config: PairingConfig) -> PairingConfig {
    config.diagnostics_enabled |= args.debug;
    config
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(debug: bool, json: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn", "rustls=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
