// Shared transport configuration for building reqwest::Client instances.
//
// The device speaks plain HTTP on the local network, so the only tunables
// are the per-request deadline and the user agent. Both the DeviceClient
// and ad-hoc consumers build their clients through this module.

use std::time::Duration;

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request deadline. Every device call fails cleanly at this bound.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent("tsuryphone-rs/0.1.0")
            .build()
            .map_err(|e| crate::error::Error::Connect(format!("failed to build HTTP client: {e}")))
    }

    /// The deadline in whole seconds, for error reporting.
    pub(crate) fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }
}
