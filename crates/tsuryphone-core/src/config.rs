// ── Runtime device configuration ──
//
// Describes *how* to reach one TsuryPhone and how aggressively to keep
// its state fresh. The setup flow constructs a `DeviceConfig` and hands
// it in -- core never reads config files.

use std::time::Duration;

use url::Url;

use crate::error::CoreError;

/// Lower bound on the polling interval. Faster than this would hammer
/// the firmware's single-threaded HTTP server.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on the polling interval.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3600);

/// Configuration for one coordinated device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Device hostname or IP on the local network.
    pub host: String,
    /// Device HTTP port.
    pub port: u16,
    /// Display name used in logs and by consumers.
    pub device_name: String,
    /// Normal polling interval. Clamped to
    /// [[`MIN_POLL_INTERVAL`], [`MAX_POLL_INTERVAL`]] at use.
    pub poll_interval: Duration,
    /// Shortened interval used for a bounded window after an action.
    pub fast_interval: Duration,
    /// How many cycles the fast interval stays active.
    pub fast_window_cycles: u32,
    /// Consecutive poll failures before availability drops.
    pub failure_threshold: u32,
    /// Per-request deadline for every device call.
    pub request_timeout: Duration,
    /// Externally reachable base URL of the automation platform,
    /// registered on the device at startup so it can call webhooks back.
    pub webhook_base_url: Option<String>,
    /// Whether to maintain the WebSocket push channel.
    pub stream_enabled: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "tsuryphone.local".into(),
            port: 80,
            device_name: "tsuryphone".into(),
            poll_interval: Duration::from_secs(60),
            fast_interval: Duration::from_secs(1),
            fast_window_cycles: 3,
            failure_threshold: 3,
            request_timeout: Duration::from_secs(10),
            webhook_base_url: None,
            stream_enabled: true,
        }
    }
}

impl DeviceConfig {
    /// The device HTTP root, e.g. `http://192.168.1.50:80`.
    pub fn base_url(&self) -> Result<Url, CoreError> {
        Url::parse(&format!("http://{}:{}", self.host, self.port)).map_err(|e| CoreError::Config {
            message: format!("invalid device address {}:{}: {e}", self.host, self.port),
        })
    }

    /// The polling interval clamped into its sane bound.
    pub fn poll_interval_clamped(&self) -> Duration {
        self.poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }

    /// The webhook server URL to register on the device, with a scheme
    /// prepended when the setup flow supplied a bare host.
    pub fn webhook_server_url(&self) -> Option<String> {
        self.webhook_base_url.as_ref().map(|raw| {
            if raw.starts_with("http://") || raw.starts_with("https://") {
                raw.clone()
            } else {
                format!("http://{raw}")
            }
        })
    }
}
