// # cf-ddns-core
//
// Core library for the Cloudflare dynamic DNS updater.
//
// ## Architecture Overview
//
// This library keeps a single DNS record in sync with the host's public IP:
// - **IpResolver**: Trait for discovering the current public address
// - **DnsRecordClient**: Trait for reading and writing the record via a provider API
// - **ReconcileLoop**: Periodic resolve → read → compare → update loop
// - **RetryPolicy**: Exponential backoff for transient failures within a cycle
//
// ## Design Principles
//
// 1. **Separation of Concerns**: The loop knows nothing about HTTP or Cloudflare
// 2. **Idempotency**: The record is only written when its value differs
// 3. **Resilience**: A failed cycle never ends the loop
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod retry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    CloudflareConfig, Credentials, DdnsConfig, EngineConfig, RecordConfig, RecordType,
    ResolverConfig, ZoneRef,
};
pub use engine::{CheckStage, CycleOutcome, LoopEvent, ReconcileLoop};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use state::DnsRecordState;
pub use traits::{DnsRecord, DnsRecordClient, IpResolver};
