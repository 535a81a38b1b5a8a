//! WebSocket push channel with auto-reconnect.
//!
//! Connects to the device's `/ws` endpoint and streams parsed
//! [`StatusDelta`]s through a [`tokio::sync::broadcast`] channel. The
//! connection state machine is observable through a `watch` channel so
//! the coordinator can fold it into per-source health. Reconnection uses
//! capped exponential backoff and never gives up: a device that stays
//! down is retried forever at the maximum interval.
//!
//! # Example
//!
//! ```rust,ignore
//! use tsuryphone_api::websocket::{PushHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = Url::parse("ws://192.168.1.50/ws")?;
//!
//! let handle = PushHandle::connect(ws_url, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(delta) = rx.recv().await {
//!     println!("state: {:?}", delta.state);
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::device::StatusDelta;
use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const DELTA_CHANNEL_CAPACITY: usize = 256;

// ── StreamState ──────────────────────────────────────────────────────

/// Push-channel connection state machine.
///
/// `Disconnected -> Connecting -> Connected -> Reconnecting -> Connecting`.
/// There is no terminal state: `Reconnecting` loops back into
/// `Connecting` forever, at the capped backoff interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

// ── PushHandle ───────────────────────────────────────────────────────

/// Handle to a running push-channel task.
///
/// Subscribe for deltas, watch the connection state, and call
/// [`shutdown`](Self::shutdown) to tear down the background task.
pub struct PushHandle {
    delta_rx: broadcast::Receiver<Arc<StatusDelta>>,
    state_rx: watch::Receiver<StreamState>,
    cancel: CancellationToken,
}

impl PushHandle {
    /// Spawn the reconnection loop against the device's push endpoint.
    ///
    /// Returns immediately; the first connection attempt happens
    /// asynchronously. Subscribe to the delta receiver to start
    /// consuming updates.
    pub fn connect(ws_url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (delta_tx, delta_rx) = broadcast::channel(DELTA_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(StreamState::Disconnected);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, delta_tx, state_tx, reconnect, task_cancel).await;
        });

        Self {
            delta_rx,
            state_rx,
            cancel,
        }
    }

    /// Get a new broadcast receiver for the delta stream.
    ///
    /// Multiple consumers can subscribe concurrently. A consumer that
    /// falls behind receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StatusDelta>> {
        self.delta_rx.resubscribe()
    }

    /// Observe the connection state machine.
    pub fn state(&self) -> watch::Receiver<StreamState> {
        self.state_rx.clone()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect -> read -> on drop, backoff -> reconnect. Forever.
async fn ws_loop(
    ws_url: Url,
    delta_tx: broadcast::Sender<Arc<StatusDelta>>,
    state_tx: watch::Sender<StreamState>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let _ = state_tx.send(StreamState::Connecting);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &delta_tx, &state_tx, &cancel) => {
                match result {
                    // Clean disconnect (server close frame or stream ended).
                    // Reset the attempt counter and reconnect promptly.
                    Ok(()) => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        tracing::info!("push channel disconnected cleanly, reconnecting");
                        attempt = 0;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "push channel error");
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                let _ = state_tx.send(StreamState::Reconnecting { attempt });
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    let _ = state_tx.send(StreamState::Disconnected);
    tracing::debug!("push channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    delta_tx: &broadcast::Sender<Arc<StatusDelta>>,
    state_tx: &watch::Sender<StreamState>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "connecting to push channel");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::StreamConnect(e.to_string()))?;

    tracing::info!("push channel connected");
    let _ = state_tx.send(StreamState::Connected);

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        parse_and_broadcast(&text, delta_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("push channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "push channel close frame received"
                            );
                        } else {
                            tracing::info!("push channel close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::StreamConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("push channel stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse a text frame as a status delta and broadcast it.
///
/// Malformed frames are logged and dropped; they never tear down the
/// connection. Frames that parse but carry no recognized fields are
/// dropped too (the firmware sends occasional keepalive objects).
fn parse_and_broadcast(text: &str, delta_tx: &broadcast::Sender<Arc<StatusDelta>>) {
    let delta: StatusDelta = match serde_json::from_str(text) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed push frame");
            return;
        }
    };

    if delta.is_empty() {
        tracing::trace!("dropping empty push frame");
        return;
    }

    // Ignore send errors -- just means no active subscribers right now
    let _ = delta_tx.send(Arc::new(delta));
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms when several
/// consumers share one device.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    // Not cryptographically random, but good enough for backoff spread.
    let jitter_factor = 1.0 + 0.25 * ((f64::from(attempt) * 7.3).sin());
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
