// # cf-ddns - Cloudflare Dynamic DNS Updater
//
// Thin integration layer: all DDNS logic lives in cf-ddns-core.
//
// The binary is responsible for:
// 1. Reading configuration from CLI flags and environment variables
// 2. Initializing logging and the runtime
// 3. Building the IP resolver and the Cloudflare client
// 4. Verifying credentials, zone and record before the loop starts
// 5. Running the reconciliation loop until SIGINT/SIGTERM
//
// ## Example
//
// ```bash
// export CF_API_TOKEN=your_token
// export DDNS_RECORD=home.example.com
// export DDNS_INTERVAL_SECS=300
//
// cf-ddns
// ```

mod cli;

use anyhow::{Context, Result};
use cf_ddns_cloudflare::CloudflareClient;
use cf_ddns_core::{CycleOutcome, DdnsConfig, DnsRecordClient, LoopEvent, ReconcileLoop};
use cf_ddns_ip_http::HttpIpResolver;
use clap::Parser;
use std::process::ExitCode;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Consecutive failed cycles before the failure streak is logged as a warning
const FAILURE_STREAK_WARNING: u32 = 3;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown (or a successful `--once` check)
/// - 1: Configuration or startup verification error
/// - 2: Runtime error (or a failed `--once` check)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let args = match cli::Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are not errors
            return if e.use_stderr() {
                DdnsExitCode::ConfigError.into()
            } else {
                DdnsExitCode::CleanShutdown.into()
            };
        }
    };

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let config = match args.to_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    info!("Starting cf-ddns {}", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    // One network call at a time; no worker threads needed
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(config, args.once)).into()
}

/// Build the components, verify the setup and run the loop
async fn run(config: DdnsConfig, once: bool) -> DdnsExitCode {
    let (reconcile, events) = match build_loop(config) {
        Ok(parts) => parts,
        Err(e) => {
            error!("Startup error: {:#}", e);
            return DdnsExitCode::ConfigError;
        }
    };

    // Installed before preflight; a signal during startup ends the process
    let mut signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!("{:#}", e);
            return DdnsExitCode::RuntimeError;
        }
    };

    if let Err(code) = startup_checks(&reconcile, signals.recv()).await {
        return code;
    }

    if once {
        let outcome = reconcile.run_cycle(&mut None).await;
        return if outcome.is_failure() {
            DdnsExitCode::RuntimeError
        } else {
            DdnsExitCode::CleanShutdown
        };
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let signal = signals.recv().await;
        info!("Received {}, finishing current cycle before exit", signal);
        let _ = shutdown_tx.send(true);
    });
    tokio::spawn(monitor_events(events));

    match reconcile.run(shutdown_rx).await {
        Ok(()) => {
            info!("Shutdown complete");
            DdnsExitCode::CleanShutdown
        }
        Err(e) => {
            error!("Loop error: {}", e);
            DdnsExitCode::RuntimeError
        }
    }
}

/// Run the preflight checks unless a shutdown signal arrives first
///
/// Fatal errors map to `ConfigError`; transient ones only warn.
async fn startup_checks(
    reconcile: &ReconcileLoop,
    signal: impl Future<Output = &'static str>,
) -> std::result::Result<(), DdnsExitCode> {
    tokio::select! {
        result = reconcile.preflight() => match result {
            Ok(()) => {
                info!("Startup checks passed");
                Ok(())
            }
            Err(e) if e.is_fatal_at_startup() => {
                error!("Startup check failed: {}", e);
                Err(DdnsExitCode::ConfigError)
            }
            Err(e) => {
                warn!("Startup check failed, starting anyway: {}", e);
                Ok(())
            }
        },
        signal = signal => {
            info!("Received {} during startup, exiting", signal);
            Err(DdnsExitCode::CleanShutdown)
        }
    }
}

fn build_loop(config: DdnsConfig) -> Result<(ReconcileLoop, mpsc::Receiver<LoopEvent>)> {
    let resolver = HttpIpResolver::new(&config.resolver, config.record.record_type)
        .context("Failed to create IP resolver")?;
    let client =
        CloudflareClient::new(&config.provider).context("Failed to create Cloudflare client")?;

    info!(
        "Managing {} record {} via {}",
        config.record.record_type,
        config.record.name,
        client.provider_name()
    );

    ReconcileLoop::new(Box::new(resolver), Box::new(client), config)
        .context("Failed to create reconciliation loop")
}

/// Log failure streaks and recoveries from the loop's event stream
async fn monitor_events(mut events: mpsc::Receiver<LoopEvent>) {
    let mut failure_streak: u32 = 0;

    while let Some(event) = events.recv().await {
        match event {
            LoopEvent::CycleCompleted { cycle, outcome } => {
                failure_streak = track_failures(failure_streak, cycle, &outcome);
            }
            other => debug!("Loop event: {:?}", other),
        }
    }
}

/// Update the failure streak after a cycle
fn track_failures(streak: u32, cycle: u64, outcome: &CycleOutcome) -> u32 {
    if outcome.is_failure() {
        let streak = streak + 1;
        if streak >= FAILURE_STREAK_WARNING {
            warn!("{} consecutive cycles failed (latest: #{})", streak, cycle);
        }
        streak
    } else {
        if streak > 0 {
            info!("Recovered after {} failed cycle(s)", streak);
        }
        0
    }
}

/// SIGTERM/SIGINT listeners, installed before the loop starts
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?,
        })
    }

    /// Wait for the first signal; returns its name
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}

/// CTRL-C listener
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> &'static str {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "CTRL-C",
            Err(e) => {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending().await
            }
        }
    }
}
