// Cloudflare API v4 wire types and error mapping
//
// Every v4 response is wrapped in the same envelope:
//
// ```json
// { "success": true, "errors": [], "messages": [], "result": ... }
// ```
//
// Failures carry numeric codes in `errors`. A few of them are mapped to
// specific error kinds; everything else is a generic provider error.

use cf_ddns_core::config::RecordType;
use cf_ddns_core::traits::DnsRecord;
use cf_ddns_core::Error;
use serde::{Deserialize, Serialize};

/// Codes reported for invalid, expired or under-privileged credentials
const AUTH_ERROR_CODES: &[u32] = &[1000, 9103, 9106, 9109, 10000, 10001];

/// Codes reported for unknown zone or record identifiers
const NOT_FOUND_ERROR_CODES: &[u32] = &[7000, 7003, 81044];

/// Response envelope
#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<CloudflareMessage>,
    pub result: Option<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CloudflareMessage {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ZoneResult {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenStatus {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserResult {
    #[serde(default)]
    pub email: String,
}

/// Result of a record DELETE
#[derive(Debug, Deserialize)]
pub(crate) struct DeletedResult {
    pub id: String,
}

/// A DNS record as returned by `/zones/{id}/dns_records`
#[derive(Debug, Deserialize)]
pub(crate) struct RecordResult {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
}

impl RecordResult {
    pub fn into_dns_record(self, expected: RecordType) -> Result<DnsRecord, Error> {
        if !self.record_type.eq_ignore_ascii_case(expected.as_str()) {
            return Err(Error::invalid_response(format!(
                "Asked for a {} record for {}, Cloudflare returned type {}",
                expected, self.name, self.record_type
            )));
        }

        Ok(DnsRecord {
            id: self.id,
            name: self.name,
            record_type: expected,
            content: self.content,
            ttl: self.ttl,
            proxied: self.proxied,
        })
    }
}

/// Body of record PUT/POST requests
#[derive(Debug, Serialize)]
pub(crate) struct RecordPayload<'a> {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: &'a str,
    pub content: &'a str,
    pub ttl: u32,
    pub proxied: bool,
}

impl<'a> From<&'a DnsRecord> for RecordPayload<'a> {
    fn from(record: &'a DnsRecord) -> Self {
        Self {
            record_type: record.record_type,
            name: &record.name,
            content: &record.content,
            // Proxied records always use automatic TTL
            ttl: if record.proxied { 1 } else { record.ttl },
            proxied: record.proxied,
        }
    }
}

impl RecordPayload<'_> {
    /// The record as it would be stored
    pub fn to_record(&self, id: &str) -> DnsRecord {
        DnsRecord {
            id: id.to_string(),
            name: self.name.to_string(),
            record_type: self.record_type,
            content: self.content.to_string(),
            ttl: self.ttl,
            proxied: self.proxied,
        }
    }
}

/// Render the `errors` array for humans
pub(crate) fn describe(errors: &[CloudflareMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Map a `success: false` envelope to an error
pub(crate) fn api_error(what: &str, errors: &[CloudflareMessage]) -> Error {
    if errors.is_empty() {
        return Error::provider("cloudflare", format!("{} failed without error details", what));
    }

    let detail = format!("{}: {}", what, describe(errors));
    if errors.iter().any(|e| AUTH_ERROR_CODES.contains(&e.code)) {
        Error::auth(detail)
    } else if errors.iter().any(|e| NOT_FOUND_ERROR_CODES.contains(&e.code)) {
        Error::not_found(detail)
    } else {
        Error::provider("cloudflare", detail)
    }
}

/// Map a non-2xx status (and its body, if any) to an error
pub(crate) fn status_error(what: &str, status: u16, body: &str) -> Error {
    let errors = serde_json::from_str::<CloudflareResponse<serde_json::Value>>(body)
        .map(|envelope| envelope.errors)
        .unwrap_or_default();

    let detail = if errors.is_empty() {
        let body = body.trim();
        if body.is_empty() {
            format!("{}: HTTP {}", what, status)
        } else {
            format!("{}: HTTP {} - {}", what, status, body.chars().take(200).collect::<String>())
        }
    } else {
        format!("{}: HTTP {} - {}", what, status, describe(&errors))
    };

    let has_code = |codes: &[u32]| errors.iter().any(|e| codes.contains(&e.code));

    match status {
        401 | 403 => Error::auth(detail),
        400 if has_code(AUTH_ERROR_CODES) => Error::auth(detail),
        400 if has_code(NOT_FOUND_ERROR_CODES) => Error::not_found(detail),
        404 => Error::not_found(detail),
        429 => Error::rate_limited(detail),
        _ => Error::http(status, detail),
    }
}
