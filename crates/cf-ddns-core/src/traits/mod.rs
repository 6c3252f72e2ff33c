//! Core traits for the DDNS updater
//!
//! - [`IpResolver`]: Discover the current public address
//! - [`DnsRecordClient`]: Read and update DNS records via provider APIs

pub mod dns_client;
pub mod ip_resolver;

pub use dns_client::{DnsRecord, DnsRecordClient};
pub use ip_resolver::IpResolver;
