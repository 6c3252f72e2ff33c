//! Test doubles and common utilities for loop contract tests
//!
//! The doubles are cheap to clone; clones share counters and scripted
//! responses, so a test keeps one handle while the loop owns another.

#![allow(dead_code)]

use cf_ddns_core::config::{CloudflareConfig, DdnsConfig, EngineConfig, RecordConfig};
use cf_ddns_core::error::{Error, Result};
use cf_ddns_core::traits::{DnsRecord, DnsRecordClient, IpResolver};
use cf_ddns_core::{RecordType, RetryPolicy};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const RECORD_NAME: &str = "home.example.com";

pub fn ip(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::from([a, b, c, d])
}

struct ResolverInner {
    scripted: Mutex<VecDeque<Result<IpAddr>>>,
    fallback: Mutex<Option<IpAddr>>,
    calls: AtomicUsize,
}

/// An IpResolver that replays scripted answers, then repeats a fallback
#[derive(Clone)]
pub struct ScriptedResolver {
    inner: Arc<ResolverInner>,
}

impl ScriptedResolver {
    /// Always resolves to `ip` unless something is scripted
    pub fn returning(ip: IpAddr) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                scripted: Mutex::new(VecDeque::new()),
                fallback: Mutex::new(Some(ip)),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Fails with a network error unless something is scripted
    pub fn failing() -> Self {
        let resolver = Self::returning(ip(0, 0, 0, 0));
        *resolver.inner.fallback.lock().unwrap() = None;
        resolver
    }

    /// Queue a one-off answer
    pub fn push(&self, answer: Result<IpAddr>) {
        self.inner.scripted.lock().unwrap().push_back(answer);
    }

    /// Change the repeated answer
    pub fn set_ip(&self, ip: IpAddr) {
        *self.inner.fallback.lock().unwrap() = Some(ip);
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpResolver for ScriptedResolver {
    async fn resolve(&self) -> Result<IpAddr> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(answer) = self.inner.scripted.lock().unwrap().pop_front() {
            return answer;
        }
        match *self.inner.fallback.lock().unwrap() {
            Some(ip) => Ok(ip),
            None => Err(Error::network("no lookup service reachable")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[derive(Default)]
struct ClientInner {
    records: Mutex<Vec<DnsRecord>>,
    verify_error: Mutex<Option<Error>>,
    get_errors: Mutex<VecDeque<Error>>,
    update_errors: Mutex<VecDeque<Error>>,
    delete_errors: Mutex<VecDeque<Error>>,
    update_delay: Mutex<Duration>,
    writes: Mutex<Vec<DnsRecord>>,
    verify_calls: AtomicUsize,
    get_calls: AtomicUsize,
    update_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

/// An in-memory DnsRecordClient
#[derive(Clone, Default)]
pub struct MockDnsClient {
    inner: Arc<ClientInner>,
}

fn a_record(id: &str, content: &str) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        name: RECORD_NAME.to_string(),
        record_type: RecordType::A,
        content: content.to_string(),
        ttl: 300,
        proxied: false,
    }
}

impl MockDnsClient {
    /// A client whose record currently holds `content`
    pub fn with_record(content: &str) -> Self {
        Self::with_records(&[content])
    }

    /// A client holding one A record per entry, with ids `rec-1`, `rec-2`, ...
    pub fn with_records(contents: &[&str]) -> Self {
        let client = Self::default();
        *client.inner.records.lock().unwrap() = contents
            .iter()
            .enumerate()
            .map(|(i, content)| a_record(&format!("rec-{}", i + 1), content))
            .collect();
        client
    }

    /// A client with no record at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// Change TTL and proxy flag of the first record
    pub fn set_settings(&self, ttl: u32, proxied: bool) {
        if let Some(record) = self.inner.records.lock().unwrap().first_mut() {
            record.ttl = ttl;
            record.proxied = proxied;
        }
    }

    pub fn fail_verify(&self, error: Error) {
        *self.inner.verify_error.lock().unwrap() = Some(error);
    }

    /// Queue an error for the next get_records() call
    pub fn fail_next_get(&self, error: Error) {
        self.inner.get_errors.lock().unwrap().push_back(error);
    }

    /// Queue an error for the next update_record() call
    pub fn fail_next_update(&self, error: Error) {
        self.inner.update_errors.lock().unwrap().push_back(error);
    }

    /// Queue an error for the next delete_record() call
    pub fn fail_next_delete(&self, error: Error) {
        self.inner.delete_errors.lock().unwrap().push_back(error);
    }

    /// Make every update take `delay`
    pub fn slow_updates(&self, delay: Duration) {
        *self.inner.update_delay.lock().unwrap() = delay;
    }

    /// First stored record
    pub fn record(&self) -> Option<DnsRecord> {
        self.inner.records.lock().unwrap().first().cloned()
    }

    /// Every stored record
    pub fn records(&self) -> Vec<DnsRecord> {
        self.inner.records.lock().unwrap().clone()
    }

    /// Every record passed to update_record() or create_record()
    pub fn writes(&self) -> Vec<DnsRecord> {
        self.inner.writes.lock().unwrap().clone()
    }

    pub fn verify_calls(&self) -> usize {
        self.inner.verify_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.inner.get_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.inner.update_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.inner.create_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.inner.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DnsRecordClient for MockDnsClient {
    async fn verify(&self) -> Result<()> {
        self.inner.verify_calls.fetch_add(1, Ordering::SeqCst);
        match self.inner.verify_error.lock().unwrap().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn get_records(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>> {
        self.inner.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.inner.get_errors.lock().unwrap().pop_front() {
            return Err(e);
        }
        Ok(self
            .inner
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name == record_name && r.record_type == record_type)
            .cloned()
            .collect())
    }

    async fn update_record(&self, record: &DnsRecord) -> Result<DnsRecord> {
        self.inner.update_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.inner.update_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(e) = self.inner.update_errors.lock().unwrap().pop_front() {
            return Err(e);
        }

        let mut records = self.inner.records.lock().unwrap();
        let stored = records
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| Error::not_found(format!("record {}", record.id)))?;
        *stored = record.clone();
        self.inner.writes.lock().unwrap().push(record.clone());
        Ok(record.clone())
    }

    async fn create_record(&self, record: &DnsRecord) -> Result<DnsRecord> {
        self.inner.create_calls.fetch_add(1, Ordering::SeqCst);

        let created = DnsRecord {
            id: "rec-new".to_string(),
            ..record.clone()
        };
        self.inner.writes.lock().unwrap().push(record.clone());
        self.inner.records.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn delete_record(&self, record: &DnsRecord) -> Result<()> {
        self.inner.delete_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(e) = self.inner.delete_errors.lock().unwrap().pop_front() {
            return Err(e);
        }

        let mut records = self.inner.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != record.id);
        if records.len() == before {
            return Err(Error::not_found(format!("record {}", record.id)));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Retry policy with millisecond delays
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

/// Helper to create a minimal DdnsConfig for testing
pub fn minimal_config(poll_interval: Duration) -> DdnsConfig {
    let mut config = DdnsConfig::new(
        CloudflareConfig::with_token("test-token"),
        RecordConfig::new(RECORD_NAME),
    );
    config.engine = EngineConfig {
        poll_interval,
        retry: fast_retry(3),
        event_channel_capacity: 100,
    };
    config
}
