// # IP Resolver Trait
//
// Defines the interface for discovering the host's current public address.
//
// ## Implementations
//
// - HTTP lookup services: `cf-ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use cf_ddns_core::IpResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* IpResolver implementation */;
//
//     let ip = resolver.resolve().await?;
//     println!("public address: {}", ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for public IP resolver implementations
///
/// A resolver answers one question: what is the public address right now.
/// It is called once per cycle by the reconciliation loop.
///
/// # Responsibilities
///
/// - Perform the lookup request(s) and parse the answer
/// - Return `Error::Network` on timeouts, non-2xx responses and
///   unparseable bodies, so the loop can retry with backoff
///
/// Resolvers do not retry, sleep, or remember earlier answers; the loop
/// owns scheduling and the record state.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Get the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The current public address
    /// - `Err(Error)`: If no lookup succeeded
    async fn resolve(&self) -> Result<IpAddr, crate::Error>;

    /// Short name for logging
    fn name(&self) -> &str;
}
