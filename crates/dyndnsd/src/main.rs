// # dyndnsd - dynamic DNS daemon
//
// Thin integration layer: reads the configuration, wires the netcup provider,
// the HTTP resolver and the address cache into a ReconciliationEngine, and
// runs passes. All DNS logic lives in dyndns-core.
//
// ## Modes
//
// - `--once`: run a single pass, exit code reflects its result
// - default: run a pass every `--interval` seconds (or `INTERVAL`) until
//   SIGINT/SIGTERM; a failed pass is logged and retried on the next tick
//
// ## Example
//
// ```bash
// export APIPASSWORD_FILE=/run/secrets/netcup_password
// dyndnsd --config /etc/dyndns/config.toml --interval 300
// ```

use anyhow::{Context, Result};
use clap::Parser;
use dyndns_core::cache::AddressCache;
use dyndns_core::{Config, PassReport, ReconciliationEngine};
use dyndns_ip_http::HttpIpResolver;
use dyndns_provider_netcup::NetcupProvider;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DyndnsExitCode {
    /// Pass succeeded, or clean shutdown of the loop
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// A pass failed (provider, resolution or cache)
    PassFailed = 2,
}

impl From<DyndnsExitCode> for ExitCode {
    fn from(code: DyndnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep netcup DNS records pointed at this machine's public address
#[derive(Parser, Debug)]
#[command(name = "dyndnsd", version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log what is being done (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Seconds between passes in loop mode
    #[arg(long, env = "INTERVAL", default_value_t = 60)]
    interval: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(args.verbose)));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DyndnsExitCode::ConfigError.into();
    }

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    if !args.once && args.interval == 0 {
        error!("--interval must be at least 1 second");
        return DyndnsExitCode::ConfigError.into();
    }

    info!(
        "Configuration loaded from {}: {} domain(s)",
        args.config.display(),
        config.domains.len()
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DyndnsExitCode::ConfigError.into();
        }
    };

    let code = rt.block_on(async {
        if args.once {
            match run_pass(&config).await {
                Ok(_) => DyndnsExitCode::Success,
                Err(e) => {
                    error!("{:#}", e);
                    DyndnsExitCode::PassFailed
                }
            }
        } else {
            match run_loop(&config, Duration::from_secs(args.interval)).await {
                Ok(()) => DyndnsExitCode::Success,
                Err(e) => {
                    error!("{:#}", e);
                    DyndnsExitCode::PassFailed
                }
            }
        }
    });

    code.into()
}

fn default_log_level(verbose: bool) -> &'static str {
    if verbose { "info" } else { "warn" }
}

/// Run one pass with a fresh engine
///
/// The cache is reloaded from disk every time, so a pass never sees state
/// left behind by a failed one.
async fn run_pass(config: &Config) -> Result<PassReport> {
    let cache = if config.cache_enabled() {
        let cache = AddressCache::open(
            config.cache_location.as_deref(),
            Duration::from_secs(config.cache_timeout_secs),
        )
        .await
        .context("Failed to open address cache")?;
        Some(cache)
    } else {
        None
    };

    let provider = NetcupProvider::new()?;
    let resolver = HttpIpResolver::from_config(config)?;

    let (mut engine, mut events) =
        ReconciliationEngine::new(config.clone(), cache, Box::new(provider), Box::new(resolver))?;

    let result = engine.run_pass().await;

    while let Ok(event) = events.try_recv() {
        debug!(?event, "engine event");
    }

    let report = result.context("Pass failed")?;
    info!(
        "{} update call(s) sent for {} domain(s)",
        report.update_calls(),
        report.domains.len()
    );
    Ok(report)
}

/// Run passes on a fixed interval until a shutdown signal arrives
async fn run_loop(config: &Config, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    info!("Running a pass every {:?}", interval);

    loop {
        tokio::select! {
            received = &mut shutdown => {
                info!("Received shutdown signal: {}", received?);
                return Ok(());
            }
            _ = ticker.tick() => {
                if let Err(e) = run_pass(config).await {
                    error!("{:#}; retrying in {:?}", e, interval);
                }
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
