//! Shared HTTP Client Module
//!
//! Provides a global, lazy-initialized HTTP client for naming requests so
//! consecutive entries in a run reuse the same connection pool and TLS
//! sessions.

use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Timeout applied to each naming request
pub const NAMING_TIMEOUT: Duration = Duration::from_secs(120);

/// Global HTTP client for naming API calls
///
/// - 120s timeout, image payloads can be several MB
/// - small idle pool, runs are strictly sequential
pub static NAMING_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .timeout(NAMING_TIMEOUT)
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .expect("Failed to create naming HTTP client")
});

/// Get the global naming HTTP client
#[inline]
pub fn naming_client() -> &'static Client {
    &NAMING_CLIENT
}
