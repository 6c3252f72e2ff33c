//! Configuration types for the DDNS updater
//!
//! The configuration is built once at startup (from CLI flags and the
//! environment) and is immutable for the lifetime of the process.

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

/// Shortest poll interval accepted from the command line
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Longest poll interval accepted from the command line (one day)
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(86_400);

/// Cloudflare's "automatic" TTL
pub const AUTO_TTL: u32 = 1;

const MIN_TTL: u32 = 60;
const MAX_TTL: u32 = 86_400;

/// IPv4 lookup services, tried in order
pub const DEFAULT_IPV4_SERVICES: &[&str] = &[
    "https://api.ipify.org",
    "https://ipv4.seeip.org",
    "https://api-ipv4.ip.sb/ip",
];

/// IPv6 lookup services, tried in order
pub const DEFAULT_IPV6_SERVICES: &[&str] = &[
    "https://api6.ipify.org",
    "https://ipv6.seeip.org",
    "https://api-ipv6.ip.sb/ip",
];

/// Main DDNS configuration
#[derive(Debug, Clone)]
pub struct DdnsConfig {
    /// Cloudflare account and zone settings
    pub provider: CloudflareConfig,

    /// The record to keep in sync
    pub record: RecordConfig,

    /// Public IP lookup settings
    pub resolver: ResolverConfig,

    /// Loop timing and retry settings
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Create a configuration with default resolver and engine settings
    pub fn new(provider: CloudflareConfig, record: RecordConfig) -> Self {
        let resolver = ResolverConfig::for_record_type(record.record_type);
        Self {
            provider,
            record,
            resolver,
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.provider.validate()?;
        self.record.validate()?;
        self.resolver.validate()?;
        self.engine.validate()?;

        if let ZoneRef::Name(zone) = &self.provider.zone {
            let zone = normalize_name(zone);
            if self.record.name != zone && !self.record.name.ends_with(&format!(".{}", zone)) {
                return Err(Error::config(format!(
                    "Record {} is not inside zone {}",
                    self.record.name, zone
                )));
            }
        }

        Ok(())
    }
}

/// How requests to Cloudflare are authenticated
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Scoped API token, sent as `Authorization: Bearer`
    Token(String),

    /// Legacy global API key with the account email
    GlobalKey {
        /// Account email
        email: String,
        /// Global API key
        api_key: String,
    },
}

// Secrets never reach logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => f.debug_tuple("Token").field(&"<REDACTED>").finish(),
            Credentials::GlobalKey { email, .. } => f
                .debug_struct("GlobalKey")
                .field("email", email)
                .field("api_key", &"<REDACTED>")
                .finish(),
        }
    }
}

impl Credentials {
    fn validate(&self) -> Result<()> {
        match self {
            Credentials::Token(token) => {
                if token.trim().is_empty() {
                    return Err(Error::config("Cloudflare API token cannot be empty"));
                }
            }
            Credentials::GlobalKey { email, api_key } => {
                if email.trim().is_empty() || !email.contains('@') {
                    return Err(Error::config("Cloudflare account email is missing or invalid"));
                }
                if api_key.trim().is_empty() {
                    return Err(Error::config("Cloudflare global API key cannot be empty"));
                }
            }
        }
        Ok(())
    }
}

/// Which zone the record lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneRef {
    /// Zone identifier as shown in the Cloudflare dashboard
    Id(String),
    /// Zone name, looked up once via the API
    Name(String),
    /// Derive the zone from the record name
    Auto,
}

/// Cloudflare provider configuration
#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    /// API credentials
    pub credentials: Credentials,

    /// Zone of the managed record
    pub zone: ZoneRef,

    /// Perform reads but only log writes
    pub dry_run: bool,
}

impl CloudflareConfig {
    /// Token-authenticated configuration with zone auto-detection
    pub fn with_token(api_token: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::Token(api_token.into()),
            zone: ZoneRef::Auto,
            dry_run: false,
        }
    }

    /// Set the zone reference
    pub fn with_zone(mut self, zone: ZoneRef) -> Self {
        self.zone = zone;
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        match &self.zone {
            ZoneRef::Id(id) if id.trim().is_empty() => {
                Err(Error::config("Cloudflare zone ID cannot be empty"))
            }
            ZoneRef::Name(name) => validate_domain_name(&normalize_name(name)),
            _ => Ok(()),
        }
    }
}

/// DNS record type managed by the updater
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RecordType {
    /// IPv4 address record
    #[serde(rename = "A")]
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name used by the DNS API
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// The record type able to hold this address
    pub fn for_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Whether this address family fits the record type
    pub fn matches(&self, ip: &IpAddr) -> bool {
        Self::for_ip(ip) == *self
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(format!(
                "unsupported record type '{}': only A and AAAA can track an IP address",
                other
            )),
        }
    }
}

/// DNS record configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordConfig {
    /// Fully qualified record name, normalized
    pub name: String,

    /// A for IPv4, AAAA for IPv6
    pub record_type: RecordType,

    /// TTL in seconds or [`AUTO_TTL`]; `None` keeps the record's current TTL
    pub ttl: Option<u32>,

    /// Cloudflare proxy flag; `None` keeps the record's current setting
    pub proxied: Option<bool>,

    /// Create the record on first run if it does not exist
    pub create_if_missing: bool,
}

impl RecordConfig {
    /// Create a new A record configuration that leaves TTL and proxying alone
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            record_type: RecordType::A,
            ttl: None,
            proxied: None,
            create_if_missing: false,
        }
    }

    /// Set the record type
    pub fn with_record_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: Option<u32>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the proxy flag
    pub fn with_proxied(mut self, proxied: Option<bool>) -> Self {
        self.proxied = proxied;
        self
    }

    /// Allow creating the record when absent
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    fn validate(&self) -> Result<()> {
        validate_domain_name(&self.name)?;

        if let Some(ttl) = self.ttl
            && ttl != AUTO_TTL
            && !(MIN_TTL..=MAX_TTL).contains(&ttl)
        {
            return Err(Error::config(format!(
                "TTL must be 1 (automatic) or between {} and {} seconds. Got: {}",
                MIN_TTL, MAX_TTL, ttl
            )));
        }

        Ok(())
    }
}

/// Public IP lookup configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Lookup service URLs, tried in order
    pub services: Vec<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ResolverConfig {
    /// Default services for the address family of `record_type`
    pub fn for_record_type(record_type: RecordType) -> Self {
        let services = match record_type {
            RecordType::A => DEFAULT_IPV4_SERVICES,
            RecordType::Aaaa => DEFAULT_IPV6_SERVICES,
        };
        Self {
            services: services.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Replace the service list
    pub fn with_services(mut self, services: Vec<String>) -> Self {
        self.services = services;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.services.is_empty() {
            return Err(Error::config("At least one IP lookup service is required"));
        }

        for url in &self.services {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(Error::config(format!(
                    "IP lookup service must use HTTP or HTTPS scheme. Got: {}",
                    url
                )));
            }
        }

        if self.timeout.is_zero() {
            return Err(Error::config("IP lookup timeout must be > 0"));
        }

        Ok(())
    }
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Time spent idle between two checks
    pub poll_interval: Duration,

    /// Retry policy for transient failures inside a cycle
    pub retry: RetryPolicy,

    /// Capacity of the loop event channel
    ///
    /// When full, events are dropped with a warning.
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            event_channel_capacity: 64,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::config("Poll interval must be > 0"));
        }

        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }

        self.retry.validate()
    }
}

/// Lower-case a domain name and strip surrounding whitespace and dots
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_matches('.').to_ascii_lowercase()
}

/// Basic DNS domain name validation per RFC 1035
///
/// Not comprehensive, but catches common errors.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return Err(Error::config(format!(
            "Domain name must contain at least two labels. Got: '{}'",
            domain
        )));
    }

    for label in labels {
        if label.is_empty() {
            return Err(Error::config(format!("Domain name has empty label: '{}'", domain)));
        }

        if label.len() > 63 {
            return Err(Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}
