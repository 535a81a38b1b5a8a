// Device HTTP client
//
// Wraps `reqwest::Client` with TsuryPhone URL construction and lenient
// body decoding. The firmware returns bare JSON objects (no envelope);
// non-2xx responses may carry a structured `{"error": ...}` body, which
// the action path surfaces as a rejection.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::device::models::{
    ActionRequest, BlockedPayload, DndPayload, PhonebookPayload, StatsPayload, StatusPayload,
    WebhooksPayload,
};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for the TsuryPhone device API.
///
/// One instance per device. Read endpoints return typed payloads; all
/// write operations flow through [`invoke_action`](Self::invoke_action).
/// Cheap to clone (the inner `reqwest::Client` is an `Arc`).
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    timeout_secs: u64,
}

/// Structured error body the firmware attaches to refused commands.
#[derive(Debug, Deserialize)]
struct DeviceErrorBody {
    error: String,
}

impl DeviceClient {
    /// Create a new device client.
    ///
    /// `base_url` is the device root, e.g. `http://192.168.1.50:80`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            timeout_secs: transport.timeout_secs(),
        })
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The push-channel URL: same host and port, `ws` scheme, `/ws` path.
    pub fn ws_url(&self) -> Result<Url, Error> {
        let mut url = self.base_url.join("/ws")?;
        url.set_scheme("ws")
            .map_err(|()| Error::StreamConnect(format!("cannot derive ws url from {url}")))?;
        Ok(url)
    }

    // ── Read endpoints ───────────────────────────────────────────────

    /// `GET /status`: current call/DnD/WiFi state.
    pub async fn status(&self) -> Result<StatusPayload, Error> {
        self.get_json("/status").await
    }

    /// `GET /stats`: uptime, memory, counters, hardware identifiers.
    pub async fn stats(&self) -> Result<StatsPayload, Error> {
        self.get_json("/stats").await
    }

    /// `GET /dnd`: Do Not Disturb configuration.
    pub async fn dnd(&self) -> Result<DndPayload, Error> {
        self.get_json("/dnd").await
    }

    /// `GET /phonebook`: quick-dial entries.
    pub async fn phonebook(&self) -> Result<PhonebookPayload, Error> {
        self.get_json("/phonebook").await
    }

    /// `GET /blocked`: blocked number list.
    pub async fn blocked(&self) -> Result<BlockedPayload, Error> {
        self.get_json("/blocked").await
    }

    /// `GET /webhooks`: webhook shortcuts.
    pub async fn webhooks(&self) -> Result<WebhooksPayload, Error> {
        self.get_json("/webhooks").await
    }

    // ── Write endpoints ──────────────────────────────────────────────

    /// `POST /action` with `{"action": <name>, ...params}`.
    ///
    /// Single request, one deadline, no automatic retry -- actions are not
    /// guaranteed idempotent (placing a call twice places two calls).
    /// Returns the device's immediate acknowledgment body; callers must
    /// not treat it as the new state.
    pub async fn invoke_action(&self, request: &ActionRequest) -> Result<serde_json::Value, Error> {
        let url = self.endpoint("/action")?;
        debug!(action = %request.action, "POST {url}");

        let resp = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;

        if !status.is_success() {
            // Prefer the firmware's structured error; fall back to the
            // status line when the body is opaque.
            let message = serde_json::from_str::<DeviceErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            return Err(Error::DeviceRejected {
                action: request.action.clone(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| Error::Protocol {
            message: e.to_string(),
            body,
        })
    }

    /// `POST /webhooks` with `{"server_url": ...}`: registers the
    /// automation platform's externally reachable base URL so the device
    /// can call back into it.
    pub async fn set_webhook_server(&self, server_url: &str) -> Result<(), Error> {
        let url = self.endpoint("/webhooks")?;
        debug!(server_url, "POST {url}");

        let resp = self
            .http
            .post(url)
            .json(&serde_json::json!({"server_url": server_url}))
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Protocol {
                message: format!("HTTP {status}"),
                body,
            });
        }
        Ok(())
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.endpoint(path)?;
        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(e, self.timeout_secs))?;

        if !status.is_success() {
            return Err(Error::Protocol {
                message: format!("HTTP {status}"),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Protocol {
            message: e.to_string(),
            body,
        })
    }
}
