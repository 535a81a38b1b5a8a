use thiserror::Error;

/// Top-level error type for the `tsuryphone-api` crate.
///
/// Covers every failure mode across the device's surfaces: transport,
/// the read endpoints, the unified action endpoint, and the WebSocket
/// push channel. `tsuryphone-core` maps these into consumer-facing
/// diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Device unreachable (connection refused, DNS failure, link down).
    #[error("Cannot reach device: {0}")]
    Connect(String),

    /// Request exceeded its deadline.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// URL construction error.
    #[error("Invalid device URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ── Payload ─────────────────────────────────────────────────────
    /// Malformed or unexpected payload, with the raw body for debugging.
    #[error("Unexpected payload from device: {message}")]
    Protocol { message: String, body: String },

    // ── Action endpoint ─────────────────────────────────────────────
    /// The device returned a structured error for a command.
    #[error("Device rejected action '{action}': {message}")]
    DeviceRejected { action: String, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// Push-channel connection failed.
    #[error("WebSocket connection failed: {0}")]
    StreamConnect(String),
}

impl Error {
    /// Classify a `reqwest::Error` into the device taxonomy.
    ///
    /// The timeout duration is reported from the transport config since
    /// reqwest does not expose the configured deadline on the error.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_decode() {
            Self::Protocol {
                message: err.to_string(),
                body: String::new(),
            }
        } else {
            Self::Connect(err.to_string())
        }
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Timeout { .. } | Self::StreamConnect(_)
        )
    }

    /// Returns `true` if the device explicitly refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::DeviceRejected { .. })
    }
}
