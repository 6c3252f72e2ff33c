// # HTTP IP Resolver
//
// This crate discovers the host's public address by asking HTTP lookup
// services that answer with the caller's IP as plain text
// (e.g. api.ipify.org, seeip.org, ip.sb).
//
// ## Failover
//
// Services are tried in configured order within a single `resolve()` call.
// A service that times out, answers with a non-2xx status or an oversized
// body, or returns something that is not an address of the expected
// family is skipped.
// Only when every service fails does the lookup fail, with
// `Error::Network`, so the loop treats it as transient.

use cf_ddns_core::config::{RecordType, ResolverConfig};
use cf_ddns_core::traits::IpResolver;
use cf_ddns_core::{Error, Result};

use std::net::IpAddr;
use tracing::{debug, warn};

/// Largest lookup answer accepted (an IPv6 address needs at most 45 bytes)
const MAX_RESPONSE_BYTES: usize = 256;

/// Public IP resolver backed by HTTP lookup services
#[derive(Debug)]
pub struct HttpIpResolver {
    /// Service URLs, tried in order
    services: Vec<String>,

    /// Address family the answer must belong to
    record_type: RecordType,

    /// HTTP client (carries the per-request timeout)
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver for addresses that fit `record_type`
    ///
    /// # Errors
    ///
    /// `Error::Config` if the service list is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: &ResolverConfig, record_type: RecordType) -> Result<Self> {
        if config.services.is_empty() {
            return Err(Error::config("At least one IP lookup service is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("cf-ddns/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            services: config.services.clone(),
            record_type,
            client,
        })
    }

    /// Query a single service
    async fn fetch_ip(&self, url: &str) -> Result<IpAddr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(format!("{} answered HTTP {}", url, status)));
        }

        let body = read_limited(response, url).await?;

        parse_address(&body, self.record_type)
            .map_err(|reason| Error::network(format!("{}: {}", url, reason)))
    }
}

/// Read the body, giving up once it exceeds [`MAX_RESPONSE_BYTES`]
async fn read_limited(mut response: reqwest::Response, url: &str) -> Result<String> {
    let too_large = || {
        Error::network(format!(
            "{} answered with more than {} bytes",
            url, MAX_RESPONSE_BYTES
        ))
    };

    if response
        .content_length()
        .is_some_and(|len| len > MAX_RESPONSE_BYTES as u64)
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| Error::network(format!("Failed to read response from {}: {}", url, e)))?
    {
        if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }

    String::from_utf8(body)
        .map_err(|_| Error::network(format!("{} answered with non-UTF-8 text", url)))
}

/// Parse a plain-text lookup answer and check its family
fn parse_address(body: &str, record_type: RecordType) -> std::result::Result<IpAddr, String> {
    let text = body.trim();
    let ip: IpAddr = text
        .parse()
        .map_err(|_| format!("not an IP address: {:?}", truncate(text, 64)))?;

    if !record_type.matches(&ip) {
        return Err(format!(
            "expected an address for a {} record, got {}",
            record_type, ip
        ));
    }

    Ok(ip)
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait::async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<IpAddr> {
        let mut failures = Vec::with_capacity(self.services.len());

        for url in &self.services {
            match self.fetch_ip(url).await {
                Ok(ip) => {
                    debug!("{} reported public address {}", url, ip);
                    return Ok(ip);
                }
                Err(e) => {
                    warn!("IP lookup failed, trying next service: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        Err(Error::network(format!(
            "All {} IP lookup service(s) failed: {}",
            self.services.len(),
            failures.join("; ")
        )))
    }

    fn name(&self) -> &str {
        "http"
    }
}
