// # Cloudflare DNS Record Client
//
// This crate implements `DnsRecordClient` on top of the Cloudflare API v4.
//
// ## Behavior
//
// - One HTTP request per operation (plus a one-time zone lookup)
// - Errors are mapped and returned; retries and backoff belong to the loop
// - HTTP timeout configured (30 seconds)
// - Dry-run mode: reads happen, writes are only logged
// - Token (Bearer) and legacy global key (X-Auth-Email/X-Auth-Key) auth
// - Zone from an explicit ID, a zone name, or derived from the record name
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or `Debug` output
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - Verify Token: GET `/user/tokens/verify`
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

mod api;

use api::{
    CloudflareResponse, DeletedResult, RecordPayload, RecordResult, TokenStatus, UserResult,
    ZoneResult,
};
use async_trait::async_trait;
use cf_ddns_core::config::{CloudflareConfig, Credentials, RecordType, ZoneRef, normalize_name};
use cf_ddns_core::traits::{DnsRecord, DnsRecordClient};
use cf_ddns_core::{Error, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Cloudflare DNS record client
///
/// # Zone Resolution
///
/// The zone ID is looked up at most once and cached for the lifetime of
/// the client. With [`ZoneRef::Auto`] the record name and each parent
/// domain are tried in turn, most specific first.
///
/// # Dry-Run Mode
///
/// When `dry_run` is set, the client will:
/// - Perform all GET requests (token check, zone lookup, record lookup)
/// - Log the intended PUT/POST/DELETE request
/// - **NOT** modify DNS records, returning the would-be record instead
pub struct CloudflareClient {
    /// API root, without trailing slash
    base_url: String,

    /// ⚠️ NEVER log these
    credentials: Credentials,

    /// How to find the zone
    zone: ZoneRef,

    /// Zone ID once resolved
    zone_id: OnceCell<String>,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: perform reads but skip writes
    dry_run: bool,
}

// Credentials are redacted by their own Debug impl; the URL and zone are safe
impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .field("zone", &self.zone)
            .field("zone_id", &self.zone_id.get())
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a new Cloudflare client
    ///
    /// # Errors
    ///
    /// `Error::Config` if the credentials are empty or the HTTP client
    /// cannot be built.
    pub fn new(config: &CloudflareConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(concat!("cf-ddns/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let credentials_missing = match &config.credentials {
            Credentials::Token(token) => token.trim().is_empty(),
            Credentials::GlobalKey { email, api_key } => {
                email.trim().is_empty() || api_key.trim().is_empty()
            }
        };
        if credentials_missing {
            return Err(Error::config("Cloudflare credentials cannot be empty"));
        }

        if config.dry_run {
            warn!("Cloudflare client running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            base_url: CLOUDFLARE_API_BASE.to_string(),
            credentials: config.credentials.clone(),
            zone: config.zone.clone(),
            zone_id: OnceCell::new(),
            client,
            dry_run: config.dry_run,
        })
    }

    /// Point the client at a different API root (e.g. a local mock)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Start an authenticated request to `path` (relative to the API root)
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));

        match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::GlobalKey { email, api_key } => builder
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", api_key),
        }
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::network(format!("{}: request failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("{}: failed to read response: {}", what, e)))?;

        if !status.is_success() {
            return Err(api::status_error(what, status.as_u16(), &body));
        }

        let envelope: CloudflareResponse<T> = serde_json::from_str(&body)
            .map_err(|e| Error::invalid_response(format!("{}: {}", what, e)))?;

        if !envelope.success {
            return Err(api::api_error(what, &envelope.errors));
        }

        envelope
            .result
            .ok_or_else(|| Error::invalid_response(format!("{}: response has no result", what)))
    }

    /// Zone ID for `record_name`, resolved once
    async fn zone_id(&self, record_name: &str) -> Result<&str> {
        self.zone_id
            .get_or_try_init(|| self.resolve_zone(record_name))
            .await
            .map(String::as_str)
    }

    async fn resolve_zone(&self, record_name: &str) -> Result<String> {
        match &self.zone {
            ZoneRef::Id(id) => {
                debug!("Using pre-configured zone ID");
                Ok(id.trim().to_string())
            }
            ZoneRef::Name(name) => {
                let name = normalize_name(name);
                self.find_zone(&name).await?.ok_or_else(|| {
                    Error::not_found(format!(
                        "Zone {} does not exist or is not accessible with these credentials",
                        name
                    ))
                })
            }
            ZoneRef::Auto => {
                for candidate in zone_candidates(record_name) {
                    if let Some(id) = self.find_zone(candidate).await? {
                        info!("Record {} belongs to zone {}", record_name, candidate);
                        return Ok(id);
                    }
                }
                Err(Error::not_found(format!(
                    "No accessible zone contains {}",
                    record_name
                )))
            }
        }
    }

    /// Look up a zone by exact name
    async fn find_zone(&self, name: &str) -> Result<Option<String>> {
        debug!("Looking up zone ID for {}", name);

        let zones: Vec<ZoneResult> = self
            .send(
                self.request(Method::GET, "/zones").query(&[("name", name)]),
                "Zone lookup",
            )
            .await?;

        Ok(zones
            .into_iter()
            .find(|zone| zone.name.eq_ignore_ascii_case(name))
            .map(|zone| zone.id))
    }

    async fn verify_credentials(&self) -> Result<()> {
        match &self.credentials {
            Credentials::Token(_) => {
                let token: TokenStatus = self
                    .send(self.request(Method::GET, "/user/tokens/verify"), "Token check")
                    .await?;
                if token.status != "active" {
                    return Err(Error::auth(format!(
                        "API token is {}, expected active",
                        token.status
                    )));
                }
                debug!("API token is active");
            }
            Credentials::GlobalKey { .. } => {
                let user: UserResult = self
                    .send(self.request(Method::GET, "/user"), "Global key check")
                    .await?;
                debug!("Global API key accepted for {}", user.email);
            }
        }
        Ok(())
    }
}

/// Possible zone names for a record, most specific first
///
/// `home.lab.example.com` yields `home.lab.example.com`, `lab.example.com`
/// and `example.com`. Bare TLDs are never queried.
fn zone_candidates(record_name: &str) -> Vec<&str> {
    let mut candidates = Vec::new();
    let mut rest = record_name;
    while rest.contains('.') {
        candidates.push(rest);
        match rest.split_once('.') {
            Some((_, parent)) => rest = parent,
            None => break,
        }
    }
    candidates
}

#[async_trait]
impl DnsRecordClient for CloudflareClient {
    /// Check the credentials and, when configured, the zone
    ///
    /// With [`ZoneRef::Auto`] the zone depends on the record name and is
    /// resolved by the first record lookup instead.
    async fn verify(&self) -> Result<()> {
        self.verify_credentials().await?;

        match &self.zone {
            ZoneRef::Id(id) => {
                let id = id.trim();
                let zone: ZoneResult = self
                    .send(
                        self.request(Method::GET, &format!("/zones/{}", id)),
                        "Zone check",
                    )
                    .await?;
                info!("Using zone {} ({})", zone.name, zone.id);
                let _ = self.zone_id.set(zone.id);
            }
            ZoneRef::Name(_) => {
                let id = self.zone_id("").await?;
                debug!("Resolved zone ID {}", id);
            }
            ZoneRef::Auto => {}
        }

        Ok(())
    }

    async fn get_records(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>> {
        let zone_id = self.zone_id(record_name).await?;

        debug!("Looking up {} records for {}", record_type, record_name);

        let records: Vec<RecordResult> = self
            .send(
                self.request(Method::GET, &format!("/zones/{}/dns_records", zone_id))
                    .query(&[("name", record_name), ("type", record_type.as_str())]),
                "Record lookup",
            )
            .await?;

        records
            .into_iter()
            .map(|record| record.into_dns_record(record_type))
            .collect()
    }

    async fn update_record(&self, record: &DnsRecord) -> Result<DnsRecord> {
        let zone_id = self.zone_id(&record.name).await?;
        let path = format!("/zones/{}/dns_records/{}", zone_id, record.id);
        let payload = RecordPayload::from(record);

        if self.dry_run {
            info!(
                "[DRY-RUN] Would send PUT {} with payload: {}",
                path,
                serde_json::to_string(&payload)?
            );
            return Ok(payload.to_record(&record.id));
        }

        let updated: RecordResult = self
            .send(
                self.request(Method::PUT, &path).json(&payload),
                "Record update",
            )
            .await?;

        debug!("Cloudflare stored {} -> {}", updated.name, updated.content);
        updated.into_dns_record(record.record_type)
    }

    async fn create_record(&self, record: &DnsRecord) -> Result<DnsRecord> {
        let zone_id = self.zone_id(&record.name).await?;
        let path = format!("/zones/{}/dns_records", zone_id);
        let payload = RecordPayload::from(record);

        if self.dry_run {
            info!(
                "[DRY-RUN] Would send POST {} with payload: {}",
                path,
                serde_json::to_string(&payload)?
            );
            return Ok(payload.to_record("dry-run"));
        }

        let created: RecordResult = self
            .send(
                self.request(Method::POST, &path).json(&payload),
                "Record creation",
            )
            .await?;

        created.into_dns_record(record.record_type)
    }

    async fn delete_record(&self, record: &DnsRecord) -> Result<()> {
        let zone_id = self.zone_id(&record.name).await?;
        let path = format!("/zones/{}/dns_records/{}", zone_id, record.id);

        if self.dry_run {
            info!(
                "[DRY-RUN] Would send DELETE {} ({} {} -> {})",
                path, record.record_type, record.name, record.content
            );
            return Ok(());
        }

        let deleted: DeletedResult = self
            .send(self.request(Method::DELETE, &path), "Record deletion")
            .await?;

        debug!("Cloudflare deleted record {}", deleted.id);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}
