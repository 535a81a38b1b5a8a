// ── Core error types ──
//
// Consumer-facing errors from tsuryphone-core. These are NOT wire-specific --
// consumers never see reqwest errors or raw response bodies directly.
// The `From<tsuryphone_api::Error>` impl translates transport-layer
// failures into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach device: {reason}")]
    DeviceUnreachable { reason: String },

    #[error("Device request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Action errors ────────────────────────────────────────────────
    #[error("Device rejected action '{action}': {message}")]
    Rejected { action: String, message: String },

    #[error("Invalid ring pattern '{pattern}': {reason}")]
    InvalidRingPattern { pattern: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tsuryphone_api::Error> for CoreError {
    fn from(err: tsuryphone_api::Error) -> Self {
        match err {
            tsuryphone_api::Error::Connect(reason) => CoreError::DeviceUnreachable { reason },
            tsuryphone_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            tsuryphone_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            // The raw body stays at the api layer; consumers get the summary.
            tsuryphone_api::Error::Protocol { message, body: _ } => {
                CoreError::Protocol { message }
            }
            tsuryphone_api::Error::DeviceRejected { action, message } => {
                CoreError::Rejected { action, message }
            }
            tsuryphone_api::Error::StreamConnect(reason) => CoreError::DeviceUnreachable {
                reason: format!("push channel: {reason}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_maps_verbatim() {
        let api_err = tsuryphone_api::Error::DeviceRejected {
            action: "call_custom".into(),
            message: "line busy".into(),
        };
        match CoreError::from(api_err) {
            CoreError::Rejected { action, message } => {
                assert_eq!(action, "call_custom");
                assert_eq!(message, "line busy");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn protocol_body_is_not_exposed() {
        let api_err = tsuryphone_api::Error::Protocol {
            message: "expected value".into(),
            body: "<html>secret guts</html>".into(),
        };
        let core_err = CoreError::from(api_err);
        assert!(!core_err.to_string().contains("secret guts"));
    }

    #[test]
    fn timeout_preserves_deadline() {
        let core_err = CoreError::from(tsuryphone_api::Error::Timeout { timeout_secs: 10 });
        assert!(matches!(core_err, CoreError::Timeout { timeout_secs: 10 }));
    }
}
