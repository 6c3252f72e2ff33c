// # Record State
//
// What the reconciliation loop last observed about the managed record.
//
// The state is a plain value owned by the loop and passed explicitly into
// each cycle. Nothing is persisted: after a restart the first cycle reads
// the record from the provider again.

use crate::traits::DnsRecord;
use chrono::{DateTime, Utc};
use std::net::IpAddr;

/// Last known state of the managed DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecordState {
    /// Provider-assigned record ID
    pub record_id: String,
    /// Address the record points at
    pub value: IpAddr,
    /// When the record was last read or written
    pub last_checked: DateTime<Utc>,
}

impl DnsRecordState {
    /// State for a record observed (or written) with `value` just now
    pub fn observed(record: &DnsRecord, value: IpAddr) -> Self {
        Self {
            record_id: record.id.clone(),
            value,
            last_checked: Utc::now(),
        }
    }

    /// State from a record as returned by the provider
    ///
    /// `None` if the record content is not an address.
    pub fn from_record(record: &DnsRecord) -> Option<Self> {
        record.ip().map(|ip| Self::observed(record, ip))
    }

    /// Time since the record was last checked
    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.last_checked)
    }
}
