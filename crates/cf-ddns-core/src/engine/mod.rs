//! Reconciliation loop
//!
//! The loop keeps one DNS record pointed at the host's public address:
//! - Resolving the public IP via an IpResolver
//! - Reading the record via a DnsRecordClient
//! - Updating the record only when its value, TTL or proxy flag differs
//! - Removing duplicate records with the same name and type
//! - Sleeping for the poll interval, then repeating
//!
//! ## States
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            ▼                              │
//!     ┌─────────────┐  interval elapsed  ┌──┴──────────┐
//!     │    Idle     │───────────────────▶│  Checking   │
//!     │  (sleep)    │◀───────────────────│ resolve →   │
//!     └─────────────┘   cycle finished   │ read → cmp  │
//!            │                           │ → (update)  │
//!            │ shutdown                  └─────────────┘
//!            ▼
//!         Stopped
//! ```
//!
//! Shutdown is only observed while Idle, so a cycle that has started
//! always runs to completion. A failed cycle is logged and the loop goes
//! back to Idle; nothing short of shutdown ends the loop.

use crate::config::{AUTO_TTL, DdnsConfig, RecordConfig};
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::state::DnsRecordState;
use crate::traits::{DnsRecord, DnsRecordClient, IpResolver};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// The part of a cycle that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStage {
    /// Public IP lookup
    Resolve,
    /// Reading the record
    Read,
    /// Writing the new value
    Update,
    /// Creating a missing record
    Create,
    /// Removing duplicate records
    Cleanup,
}

impl fmt::Display for CheckStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            CheckStage::Resolve => "resolve",
            CheckStage::Read => "read",
            CheckStage::Update => "update",
            CheckStage::Create => "create",
            CheckStage::Cleanup => "cleanup",
        };
        f.write_str(stage)
    }
}

/// Result of a single Checking pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Record already points at the public address
    Unchanged {
        /// The current address
        ip: IpAddr,
    },

    /// Record was rewritten, or duplicates serving other addresses were removed
    Updated {
        /// Value before the update (None if it was not an address)
        previous: Option<IpAddr>,
        /// Value after the update
        current: IpAddr,
    },

    /// Record did not exist and was created
    Created {
        /// The created value
        ip: IpAddr,
    },

    /// The cycle gave up; the next one will try again
    Failed {
        /// Where it failed
        stage: CheckStage,
        /// Error message
        error: String,
    },
}

impl CycleOutcome {
    /// Whether the cycle ended in failure
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed { .. })
    }

    fn failed(stage: CheckStage, error: &Error) -> Self {
        CycleOutcome::Failed {
            stage,
            error: error.to_string(),
        }
    }
}

/// Events emitted by the loop for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Loop started
    Started {
        record_name: String,
    },

    /// A Checking pass finished
    CycleCompleted {
        /// 1-based cycle counter
        cycle: u64,
        outcome: CycleOutcome,
    },

    /// Loop stopped
    Stopped {
        reason: String,
        cycles: u64,
    },
}

/// Reconciliation loop for a single record
///
/// ## Lifecycle
///
/// 1. Create with [`ReconcileLoop::new()`]
/// 2. Optionally check the setup with [`ReconcileLoop::preflight()`]
/// 3. Run with [`ReconcileLoop::run()`] until the shutdown flag is set,
///    or drive single passes with [`ReconcileLoop::run_cycle()`]
///
/// ## Threading
///
/// All work happens sequentially on the caller's task; no two network
/// calls are ever in flight at once.
pub struct ReconcileLoop {
    /// Public IP lookup
    resolver: Box<dyn IpResolver>,

    /// DNS API client
    client: Box<dyn DnsRecordClient>,

    /// The managed record
    record: RecordConfig,

    /// Idle time between cycles
    poll_interval: Duration,

    /// Retry policy for each network stage
    retry: RetryPolicy,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<LoopEvent>,
}

impl ReconcileLoop {
    /// Create a new loop
    ///
    /// # Returns
    ///
    /// A tuple of (loop, event_receiver) where event_receiver yields loop events
    pub fn new(
        resolver: Box<dyn IpResolver>,
        client: Box<dyn DnsRecordClient>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<LoopEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let reconcile = Self {
            resolver,
            client,
            record: config.record,
            poll_interval: config.engine.poll_interval,
            retry: config.engine.retry,
            event_tx: tx,
        };

        Ok((reconcile, rx))
    }

    /// Check credentials, zone and record before entering the loop
    ///
    /// A missing record is acceptable when it may be created. Errors are
    /// returned unchanged; the caller decides which ones are fatal
    /// (see [`Error::is_fatal_at_startup`]).
    pub async fn preflight(&self) -> Result<()> {
        self.client.verify().await?;

        let records = self
            .client
            .get_records(&self.record.name, self.record.record_type)
            .await?;

        match records.as_slice() {
            [] if self.record.create_if_missing => {
                info!(
                    "{} record {} does not exist yet and will be created",
                    self.record.record_type, self.record.name
                );
                Ok(())
            }
            [] => Err(Error::record_not_found(
                &self.record.name,
                self.record.record_type,
            )),
            [record, rest @ ..] => {
                info!(
                    "Managing {} record {} (currently {})",
                    record.record_type, record.name, record.content
                );
                if !rest.is_empty() {
                    warn!(
                        "{} has {} duplicate {} record(s); they will be removed",
                        record.name,
                        rest.len(),
                        record.record_type
                    );
                }
                Ok(())
            }
        }
    }

    /// Run until shutdown is requested
    ///
    /// The loop exits once `shutdown` holds `true` (or its sender is
    /// dropped) while Idle. A shutdown requested mid-cycle takes effect
    /// after that cycle completes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.emit_event(LoopEvent::Started {
            record_name: self.record.name.clone(),
        });
        info!(
            "Reconciling {} record {} every {:?}",
            self.record.record_type, self.record.name, self.poll_interval
        );

        let mut state: Option<DnsRecordState> = None;
        let mut cycles: u64 = 0;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            cycles += 1;
            let outcome = self.run_cycle(&mut state).await;
            self.emit_event(LoopEvent::CycleCompleted {
                cycle: cycles,
                outcome,
            });

            if self.idle(&mut shutdown).await {
                break;
            }
        }

        info!("Shutdown requested, stopped after {} cycle(s)", cycles);
        self.emit_event(LoopEvent::Stopped {
            reason: "Shutdown signal".to_string(),
            cycles,
        });

        Ok(())
    }

    /// Sleep for the poll interval; returns true if shutdown was requested
    async fn idle(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let deadline = Instant::now() + self.poll_interval;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return false,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        return true;
                    }
                }
            }
        }
    }

    /// Perform one Checking pass
    ///
    /// `state` is replaced whenever the record was successfully read or
    /// written, and left alone when the cycle fails before that.
    pub async fn run_cycle(&self, state: &mut Option<DnsRecordState>) -> CycleOutcome {
        let outcome = self.check(state).await;
        match &outcome {
            CycleOutcome::Unchanged { ip } => {
                debug!("{} already points at {}", self.record.name, ip)
            }
            CycleOutcome::Updated { previous, current } => info!(
                "Updated {} -> {} (previous: {})",
                self.record.name,
                current,
                previous.map_or_else(|| "unknown".to_string(), |ip| ip.to_string())
            ),
            CycleOutcome::Created { ip } => info!("Created {} -> {}", self.record.name, ip),
            CycleOutcome::Failed { stage, error } => error!(
                "Cycle failed for {} at {} stage: {}; will retry next cycle",
                self.record.name, stage, error
            ),
        }
        outcome
    }

    async fn check(&self, state: &mut Option<DnsRecordState>) -> CycleOutcome {
        let name = self.record.name.as_str();
        let record_type = self.record.record_type;

        let ip = match self
            .retry
            .run("Public IP lookup", || self.resolver.resolve())
            .await
        {
            Ok(ip) => ip,
            Err(e) => return CycleOutcome::failed(CheckStage::Resolve, &e),
        };

        if !record_type.matches(&ip) {
            let e = Error::invalid_response(format!(
                "{} resolved {}, which cannot be stored in a {} record",
                self.resolver.name(),
                ip,
                record_type
            ));
            return CycleOutcome::failed(CheckStage::Resolve, &e);
        }
        debug!("Public address is {}", ip);

        let mut records = match self
            .retry
            .run("Record lookup", || self.client.get_records(name, record_type))
            .await
        {
            Ok(records) => records,
            Err(e) => return CycleOutcome::failed(CheckStage::Read, &e),
        };

        if records.is_empty() {
            if self.record.create_if_missing {
                return self.create(ip, state).await;
            }
            let e = Error::record_not_found(name, record_type);
            return CycleOutcome::failed(CheckStage::Read, &e);
        }

        // Keep the record already holding the address, if any
        let keep = records.iter().position(|r| r.ip() == Some(ip)).unwrap_or(0);
        let current = records.remove(keep);
        let duplicates = records;

        let previous = current.ip();
        let desired = self.desired_record(&current, ip);
        let in_sync = previous == Some(ip)
            && desired.ttl == current.ttl
            && desired.proxied == current.proxied;

        if in_sync {
            *state = Some(DnsRecordState::observed(&current, ip));
        } else {
            if let Some(last) = state.as_ref() {
                debug!(
                    "Record {} last seen at {} ({}s ago)",
                    name,
                    last.value,
                    last.age().num_seconds()
                );
            }

            match self
                .retry
                .run("Record update", || self.client.update_record(&desired))
                .await
            {
                Ok(stored) => *state = Some(DnsRecordState::observed(&stored, ip)),
                Err(e) => {
                    *state = DnsRecordState::from_record(&current);
                    return CycleOutcome::failed(CheckStage::Update, &e);
                }
            }
        }

        if !duplicates.is_empty() {
            warn!(
                "Removing {} duplicate {} record(s) for {}",
                duplicates.len(),
                record_type,
                name
            );
            for duplicate in &duplicates {
                if let Err(e) = self
                    .retry
                    .run("Duplicate removal", || self.client.delete_record(duplicate))
                    .await
                {
                    return CycleOutcome::failed(CheckStage::Cleanup, &e);
                }
                debug!("Removed {} (was {})", duplicate.id, duplicate.content);
            }
        }

        if in_sync && duplicates.is_empty() {
            CycleOutcome::Unchanged { ip }
        } else {
            CycleOutcome::Updated {
                previous,
                current: ip,
            }
        }
    }

    async fn create(&self, ip: IpAddr, state: &mut Option<DnsRecordState>) -> CycleOutcome {
        let record = self.new_record(ip);
        match self
            .retry
            .run("Record creation", || self.client.create_record(&record))
            .await
        {
            Ok(created) => {
                *state = Some(DnsRecordState::observed(&created, ip));
                CycleOutcome::Created { ip }
            }
            Err(e) => CycleOutcome::failed(CheckStage::Create, &e),
        }
    }

    /// The existing record pointed at `ip`, with configured TTL/proxy overrides
    ///
    /// Proxied records always carry [`AUTO_TTL`], matching what the
    /// provider stores for them.
    fn desired_record(&self, current: &DnsRecord, ip: IpAddr) -> DnsRecord {
        let mut desired = current.with_ip(ip);
        if let Some(ttl) = self.record.ttl {
            desired.ttl = ttl;
        }
        if let Some(proxied) = self.record.proxied {
            desired.proxied = proxied;
        }
        if desired.proxied {
            desired.ttl = AUTO_TTL;
        }
        desired
    }

    fn new_record(&self, ip: IpAddr) -> DnsRecord {
        let proxied = self.record.proxied.unwrap_or(false);
        DnsRecord {
            id: String::new(),
            name: self.record.name.clone(),
            record_type: self.record.record_type,
            content: ip.to_string(),
            ttl: if proxied {
                AUTO_TTL
            } else {
                self.record.ttl.unwrap_or(AUTO_TTL)
            },
            proxied,
        }
    }

    /// Emit a loop event
    fn emit_event(&self, event: LoopEvent) {
        // Never block the loop on a slow consumer
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping event");
        }
    }
}
