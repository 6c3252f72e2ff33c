//! Command-line and environment configuration
//!
//! Every flag can also be set through an environment variable, which is
//! how the updater is usually configured inside a container.

use anyhow::{Context, Result, bail};
use cf_ddns_core::config::{
    CloudflareConfig, Credentials, DdnsConfig, EngineConfig, MAX_POLL_INTERVAL,
    MIN_POLL_INTERVAL, RecordConfig, RecordType, ResolverConfig, ZoneRef,
};
use cf_ddns_core::RetryPolicy;
use clap::Parser;
use std::time::Duration;
use tracing::{Level, warn};

/// Keep a Cloudflare DNS record pointed at this host's public IP address
#[derive(Parser)]
#[command(name = "cf-ddns", version, about)]
pub struct Args {
    /// Cloudflare API token with Zone:DNS:Edit permission
    #[arg(long, env = "CF_API_TOKEN", hide_env_values = true, conflicts_with_all = ["email", "api_key"])]
    pub api_token: Option<String>,

    /// Account email for legacy global API key authentication
    #[arg(long, env = "CF_API_EMAIL", requires = "api_key")]
    pub email: Option<String>,

    /// Legacy global API key
    #[arg(long, env = "CF_API_KEY", hide_env_values = true, requires = "email")]
    pub api_key: Option<String>,

    /// Zone ID of the record's zone
    #[arg(long, env = "CF_ZONE_ID", conflicts_with = "zone")]
    pub zone_id: Option<String>,

    /// Zone name (e.g. example.com); derived from the record when omitted
    #[arg(long, env = "CF_ZONE_NAME")]
    pub zone: Option<String>,

    /// Fully qualified name of the record to keep updated
    #[arg(long, env = "DDNS_RECORD")]
    pub record: String,

    /// Record type: A (IPv4) or AAAA (IPv6)
    #[arg(long, env = "DDNS_RECORD_TYPE", default_value = "A")]
    pub record_type: RecordType,

    /// TTL to enforce: 1 (automatic) or 60-86400; keeps the current TTL when omitted
    #[arg(long, env = "DDNS_TTL")]
    pub ttl: Option<u32>,

    /// Cloudflare proxy flag to enforce (true/false); left as is when omitted
    #[arg(long, env = "DDNS_PROXIED")]
    pub proxied: Option<bool>,

    /// Create the record if it does not exist
    #[arg(long, env = "DDNS_CREATE_MISSING")]
    pub create_missing: bool,

    /// Seconds between checks
    #[arg(long, env = "DDNS_INTERVAL_SECS", default_value_t = 300)]
    pub interval: u64,

    /// Public IP lookup service URL, tried in order (repeatable)
    #[arg(long = "ip-service", env = "DDNS_IP_SERVICES", value_delimiter = ',')]
    pub ip_services: Vec<String>,

    /// Attempts per network operation before a cycle gives up
    #[arg(long, env = "DDNS_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Initial delay between attempts, in seconds
    #[arg(long, env = "DDNS_RETRY_DELAY_SECS", default_value_t = 2)]
    pub retry_delay: u64,

    /// Upper bound for the delay between attempts, in seconds
    #[arg(long, env = "DDNS_MAX_RETRY_DELAY_SECS", default_value_t = 30)]
    pub max_retry_delay: u64,

    /// Read everything but only log the changes that would be made
    #[arg(long, env = "DDNS_DRY_RUN")]
    pub dry_run: bool,

    /// Run a single check and exit
    #[arg(long, env = "DDNS_ONCE")]
    pub once: bool,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, env = "DDNS_LOG_LEVEL", default_value = "info")]
    pub log_level: Level,
}

impl Args {
    /// Build and validate the updater configuration
    pub fn to_config(&self) -> Result<DdnsConfig> {
        let credentials = match (&self.api_token, &self.email, &self.api_key) {
            (Some(token), _, _) => Credentials::Token(token.clone()),
            (None, Some(email), Some(api_key)) => Credentials::GlobalKey {
                email: email.clone(),
                api_key: api_key.clone(),
            },
            _ => bail!(
                "Cloudflare credentials are required. \
                Set CF_API_TOKEN (preferred), or CF_API_EMAIL and CF_API_KEY"
            ),
        };

        let zone = match (&self.zone_id, &self.zone) {
            (Some(id), _) => ZoneRef::Id(id.clone()),
            (None, Some(name)) => ZoneRef::Name(name.clone()),
            (None, None) => ZoneRef::Auto,
        };

        let poll_interval = Duration::from_secs(self.interval);
        if !(MIN_POLL_INTERVAL..=MAX_POLL_INTERVAL).contains(&poll_interval) {
            bail!(
                "DDNS_INTERVAL_SECS must be between {} and {} seconds. Got: {}",
                MIN_POLL_INTERVAL.as_secs(),
                MAX_POLL_INTERVAL.as_secs(),
                self.interval
            );
        }

        if self.retry_delay == 0 {
            bail!("DDNS_RETRY_DELAY_SECS must be at least 1 second");
        }

        let mut resolver = ResolverConfig::for_record_type(self.record_type);
        if !self.ip_services.is_empty() {
            let services: Vec<String> = self
                .ip_services
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();

            for url in services.iter().filter(|u| u.starts_with("http://")) {
                warn!("IP lookup service {} uses HTTP (not HTTPS)", url);
            }
            resolver = resolver.with_services(services);
        }

        let config = DdnsConfig {
            provider: CloudflareConfig {
                credentials,
                zone,
                dry_run: self.dry_run,
            },
            record: RecordConfig::new(&self.record)
                .with_record_type(self.record_type)
                .with_ttl(self.ttl)
                .with_proxied(self.proxied)
                .with_create_if_missing(self.create_missing),
            resolver,
            engine: EngineConfig {
                poll_interval,
                retry: RetryPolicy {
                    max_attempts: self.max_attempts,
                    base_delay: Duration::from_secs(self.retry_delay),
                    max_delay: Duration::from_secs(self.max_retry_delay),
                },
                ..EngineConfig::default()
            },
        };

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}
