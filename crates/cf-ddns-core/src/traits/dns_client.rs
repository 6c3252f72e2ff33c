// # DNS Record Client Trait
//
// Defines the interface for reading and writing a DNS record through a
// provider API.
//
// ## Implementations
//
// - Cloudflare: `cf-ddns-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use cf_ddns_core::{DnsRecordClient, RecordType};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* DnsRecordClient implementation */;
//
//     let record = client.get_record("home.example.com", RecordType::A).await?;
//     let new_ip = std::net::IpAddr::from([203, 0, 113, 7]);
//     if record.ip() != Some(new_ip) {
//         client.update_record(&record.with_ip(new_ip)).await?;
//     }
//
//     Ok(())
// }
// ```

use crate::config::RecordType;
use async_trait::async_trait;
use std::net::IpAddr;

/// A DNS record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// The record ID (provider-specific)
    pub id: String,
    /// Fully qualified record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Record content, an IP address for A/AAAA records
    pub content: String,
    /// Time-to-live (1 means automatic on Cloudflare)
    pub ttl: u32,
    /// Whether traffic is proxied through the provider
    pub proxied: bool,
}

impl DnsRecord {
    /// The record content parsed as an address
    ///
    /// `None` if the content is not an IP (e.g. hand-edited to garbage).
    pub fn ip(&self) -> Option<IpAddr> {
        self.content.trim().parse().ok()
    }

    /// Copy of this record pointing at `ip`
    pub fn with_ip(&self, ip: IpAddr) -> Self {
        Self {
            content: ip.to_string(),
            ..self.clone()
        }
    }
}

/// Trait for DNS record client implementations
///
/// Clients are stateless with respect to the record: each call performs
/// the API request(s) it needs and reports the outcome. Deciding whether
/// an update is needed, retrying and backoff are owned by the
/// reconciliation loop.
///
/// # Errors
///
/// - `Error::Authentication` for invalid or under-privileged credentials
/// - `Error::NotFound` for a missing zone or record
/// - `Error::Network`, `Error::RateLimited` or a 5xx `Error::Http` for
///   transient failures
#[async_trait]
pub trait DnsRecordClient: Send + Sync {
    /// Check credentials and zone access
    ///
    /// Called once at startup so that configuration mistakes are fatal
    /// before the loop starts.
    async fn verify(&self) -> Result<(), crate::Error>;

    /// Fetch every record with this name and type
    ///
    /// # Returns
    ///
    /// - `Ok(vec![])`: No such record exists
    /// - `Ok(records)`: Normally one record; more when duplicates exist
    async fn get_records(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Fetch the current record
    ///
    /// When duplicates exist, the first one reported by the provider wins.
    ///
    /// # Returns
    ///
    /// - `Ok(DnsRecord)`: The record's current state
    /// - `Err(Error::NotFound)`: The record does not exist
    async fn get_record(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<DnsRecord, crate::Error> {
        self.get_records(record_name, record_type)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| crate::Error::record_not_found(record_name, record_type))
    }

    /// Overwrite an existing record (matched by `record.id`)
    ///
    /// # Returns
    ///
    /// The record as stored by the provider after the update
    async fn update_record(&self, record: &DnsRecord) -> Result<DnsRecord, crate::Error>;

    /// Create a new record; `record.id` is ignored
    ///
    /// # Returns
    ///
    /// The created record, carrying its provider-assigned ID
    async fn create_record(&self, record: &DnsRecord) -> Result<DnsRecord, crate::Error>;

    /// Remove a record (matched by `record.id`)
    async fn delete_record(&self, record: &DnsRecord) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
