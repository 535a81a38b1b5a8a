// ── State coordinator ──
//
// Full lifecycle management for one TsuryPhone device. Merges the poll
// loop and the push channel into a single authoritative snapshot,
// exposes the action surface, and manages refresh cadence
// (normal / fast-after-action / degraded-on-failure).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tsuryphone_api::DeviceClient;
use tsuryphone_api::device::StatusDelta;
use tsuryphone_api::transport::TransportConfig;
use tsuryphone_api::websocket::{PushHandle, ReconnectConfig, StreamState};

use crate::action::{ConfigSection, DeviceAction};
use crate::config::DeviceConfig;
use crate::convert;
use crate::error::CoreError;
use crate::health::{ConnectionHealth, HealthReport, HealthTracker};
use crate::model::DeviceState;
use crate::poll::PollFetcher;
use crate::stream::StateStream;

const REFRESH_CHANNEL_SIZE: usize = 8;

/// Reconnect attempts after which the push source counts as failed.
/// Backoff has reached its cap by then; the loop itself never stops.
const STREAM_FAILED_AFTER: u32 = 5;

// ── CurrentState ─────────────────────────────────────────────────────

/// What consumers observe: the last known snapshot plus availability.
///
/// The snapshot is immutable and always fully formed; stale data stays
/// readable when the device goes dark, flagged by `available`.
#[derive(Debug, Clone)]
pub struct CurrentState {
    pub snapshot: Arc<DeviceState>,
    pub available: bool,
}

// ── PendingAction ────────────────────────────────────────────────────

/// Ephemeral record of an in-flight outbound command.
#[derive(Debug, Clone)]
pub struct PendingAction {
    pub id: Uuid,
    pub action: &'static str,
    pub issued_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

/// Removes the pending entry on every exit path, including drop-cancel.
struct PendingGuard<'a> {
    pending: &'a DashMap<Uuid, PendingAction>,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

// ── RefreshPolicy ────────────────────────────────────────────────────

/// Scheduler-owned refresh cadence.
///
/// Only the scheduler task reads or writes this; other tasks request
/// fast mode through the refresh channel, never by direct mutation.
#[derive(Debug)]
struct RefreshPolicy {
    normal: Duration,
    fast: Duration,
    window: u32,
    fast_remaining: u32,
}

impl RefreshPolicy {
    fn new(normal: Duration, fast: Duration, window: u32) -> Self {
        Self {
            normal,
            fast,
            window,
            fast_remaining: 0,
        }
    }

    fn current_interval(&self) -> Duration {
        if self.fast_remaining > 0 {
            self.fast
        } else {
            self.normal
        }
    }

    fn enter_fast_mode(&mut self) {
        self.fast_remaining = self.window;
    }

    /// Account one completed scheduled cycle.
    fn complete_cycle(&mut self) {
        self.fast_remaining = self.fast_remaining.saturating_sub(1);
    }
}

// ── Coordinator ──────────────────────────────────────────────────────

/// Request sent to the scheduler task.
#[derive(Debug)]
enum RefreshRequest {
    /// Refresh now and enter the fast window (an action just ran).
    Fast,
}

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. One instance per
/// configured device; it exclusively owns the snapshot and the refresh
/// policy. Constructed explicitly and passed by reference -- there is
/// no ambient singleton.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: DeviceConfig,
    client: DeviceClient,
    fetcher: PollFetcher,
    /// Merge critical section: every read-modify-write of the snapshot
    /// and health goes through this lock, so merges are serialized.
    shared: Mutex<Shared>,
    state_tx: watch::Sender<CurrentState>,
    refresh_tx: mpsc::Sender<RefreshRequest>,
    refresh_rx: Mutex<Option<mpsc::Receiver<RefreshRequest>>>,
    pending: DashMap<Uuid, PendingAction>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    state: DeviceState,
    health: HealthTracker,
}

impl Coordinator {
    /// Create a new coordinator from configuration. Does NOT touch the
    /// network -- call [`start()`](Self::start) to begin syncing.
    pub fn new(config: DeviceConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            timeout: config.request_timeout,
        };
        let client = DeviceClient::new(config.base_url()?, &transport)?;
        let fetcher = PollFetcher::new(client.clone());

        let initial = CurrentState {
            snapshot: Arc::new(DeviceState::default()),
            available: false,
        };
        let (state_tx, _) = watch::channel(initial);
        let (refresh_tx, refresh_rx) = mpsc::channel(REFRESH_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                shared: Mutex::new(Shared {
                    state: DeviceState::default(),
                    health: HealthTracker::new(config.failure_threshold),
                }),
                config,
                client,
                fetcher,
                state_tx,
                refresh_tx,
                refresh_rx: Mutex::new(Some(refresh_rx)),
                pending: DashMap::new(),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Access the device configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start syncing: register the webhook server on the device, run an
    /// initial refresh, and spawn the background tasks (scheduler, push
    /// channel pump).
    ///
    /// Startup failures degrade into health state rather than aborting;
    /// the coordinator keeps retrying until [`shutdown()`](Self::shutdown).
    pub async fn start(&self) {
        if let Some(server_url) = self.inner.config.webhook_server_url() {
            match self.inner.client.set_webhook_server(&server_url).await {
                Ok(()) => info!(%server_url, "registered webhook server on device"),
                Err(e) => warn!(error = %e, "failed to register webhook server on device"),
            }
        }

        // Initial data load; a dark device shows up as unavailable.
        self.refresh_cycle().await;

        let Some(refresh_rx) = self.inner.refresh_rx.lock().await.take() else {
            warn!("coordinator already started");
            return;
        };

        let mut handles = self.inner.task_handles.lock().await;
        handles.push(tokio::spawn(scheduler_task(
            self.clone(),
            refresh_rx,
            self.inner.cancel.clone(),
        )));

        if self.inner.config.stream_enabled {
            handles.push(tokio::spawn(stream_task(
                self.clone(),
                self.inner.cancel.clone(),
            )));
        }

        info!(device = %self.inner.config.device_name, "coordinator started");
    }

    /// Stop background tasks and release the push connection.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("coordinator shut down");
    }

    // ── State observation ────────────────────────────────────────────

    /// The last known snapshot plus availability. Non-blocking.
    pub fn current(&self) -> CurrentState {
        self.inner.state_tx.borrow().clone()
    }

    /// Subscribe to state-changed notifications.
    ///
    /// Fan-out happens through a `watch` channel, so publishing never
    /// waits on consumers; a slow consumer just observes the latest
    /// state when it catches up.
    pub fn subscribe(&self) -> watch::Receiver<CurrentState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe as a `Stream` for use with `StreamExt` combinators.
    pub fn state_stream(&self) -> StateStream {
        StateStream::new(self.inner.state_tx.subscribe())
    }

    /// Per-source connection health and the derived availability flag.
    pub async fn connection_health(&self) -> HealthReport {
        self.inner.shared.lock().await.health.report()
    }

    /// How long ago any source last delivered, or `None` if never.
    pub async fn data_age(&self) -> Option<chrono::Duration> {
        self.inner.shared.lock().await.health.data_age()
    }

    /// Snapshot of the in-flight outbound commands.
    pub fn pending_actions(&self) -> Vec<PendingAction> {
        self.inner.pending.iter().map(|e| e.value().clone()).collect()
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Invoke a device action.
    ///
    /// Errors propagate to the caller verbatim -- the caller chose to
    /// act and must know whether it succeeded. On success the device's
    /// immediate acknowledgment is returned, an out-of-band refresh is
    /// scheduled, and the refresh policy enters its fast window; the
    /// acknowledgment must NOT be treated as the new state.
    pub async fn request_action(
        &self,
        action: DeviceAction,
    ) -> Result<serde_json::Value, CoreError> {
        let request = action.to_request();
        let issued_at = Utc::now();
        let id = Uuid::new_v4();
        self.inner.pending.insert(
            id,
            PendingAction {
                id,
                action: action.wire_name(),
                issued_at,
                deadline: issued_at
                    + chrono::Duration::from_std(self.inner.config.request_timeout)
                        .unwrap_or_else(|_| chrono::Duration::seconds(10)),
            },
        );
        let _guard = PendingGuard {
            pending: &self.inner.pending,
            id,
        };

        let ack = self.inner.client.invoke_action(&request).await?;
        info!(action = %request.action, "device action acknowledged");

        // Mutating config actions invalidate their section; re-fetch it
        // best-effort so consumers see the result without waiting a cycle.
        if let Some(section) = action.refresh_section() {
            if let Err(e) = self.fetch_section(section).await {
                warn!(error = %e, "post-action section refresh failed");
            }
        }

        // Ask the scheduler for an immediate refresh + fast window. If
        // the channel is full a fast request is already queued.
        let _ = self.inner.refresh_tx.try_send(RefreshRequest::Fast);

        Ok(ack)
    }

    // ── Merge entry points ───────────────────────────────────────────

    /// Apply a partial update from the push channel.
    ///
    /// Field-level overlay onto the current snapshot; fields absent
    /// from the delta carry over unchanged. Never fails: this is a
    /// stream-side entry point and stream problems are health, not
    /// errors.
    pub async fn merge_delta(&self, delta: &StatusDelta) {
        let mut shared = self.inner.shared.lock().await;

        let mut status = shared.state.status.clone().unwrap_or_default();
        convert::apply_status_delta(&mut status, delta);
        shared.state.status = Some(status);

        shared.health.record_stream_update();
        self.publish(&shared);
    }

    /// Run one poll cycle.
    ///
    /// On success the polled sections replace wholesale (polls are
    /// complete per-section snapshots). On failure the consecutive
    /// failure counter advances and, past the threshold, availability
    /// drops -- but the snapshot stays readable and the loop never
    /// stops retrying.
    pub async fn refresh_cycle(&self) {
        // Network I/O happens outside the merge critical section.
        match self.inner.fetcher.fetch().await {
            Ok(snapshot) => {
                let mut shared = self.inner.shared.lock().await;
                if let Some(status) = snapshot.status {
                    shared.state.status = Some(status.into());
                }
                if let Some(stats) = snapshot.stats {
                    shared.state.stats = Some(stats.into());
                }
                shared.health.record_poll_success();
                if snapshot.partial {
                    debug!("poll returned partial data");
                }
                self.publish(&shared);
            }
            Err(e) => {
                let mut shared = self.inner.shared.lock().await;
                shared.health.record_poll_failure();
                warn!(
                    error = %e,
                    consecutive_failures = shared.health.poll.consecutive_failures,
                    "refresh cycle failed"
                );
                self.publish(&shared);
            }
        }
    }

    // ── On-demand configuration sections ─────────────────────────────

    /// Do Not Disturb configuration, fetched on first use.
    pub async fn dnd(&self) -> Result<crate::model::DndConfig, CoreError> {
        if self.current().snapshot.dnd.is_none() {
            self.fetch_section(ConfigSection::Dnd).await?;
        }
        self.current()
            .snapshot
            .dnd
            .clone()
            .ok_or_else(|| CoreError::Internal("dnd section missing after fetch".into()))
    }

    /// Quick-dial phonebook, fetched on first use.
    pub async fn phonebook(&self) -> Result<Vec<crate::model::QuickDialEntry>, CoreError> {
        if self.current().snapshot.phonebook.is_none() {
            self.fetch_section(ConfigSection::Phonebook).await?;
        }
        self.current()
            .snapshot
            .phonebook
            .clone()
            .ok_or_else(|| CoreError::Internal("phonebook section missing after fetch".into()))
    }

    /// Blocked numbers, fetched on first use.
    pub async fn blocked_numbers(&self) -> Result<Vec<String>, CoreError> {
        if self.current().snapshot.blocked.is_none() {
            self.fetch_section(ConfigSection::Blocked).await?;
        }
        self.current()
            .snapshot
            .blocked
            .clone()
            .ok_or_else(|| CoreError::Internal("blocked section missing after fetch".into()))
    }

    /// Webhook shortcuts, fetched on first use.
    pub async fn webhooks(&self) -> Result<Vec<crate::model::WebhookShortcut>, CoreError> {
        if self.current().snapshot.webhooks.is_none() {
            self.fetch_section(ConfigSection::Webhooks).await?;
        }
        self.current()
            .snapshot
            .webhooks
            .clone()
            .ok_or_else(|| CoreError::Internal("webhooks section missing after fetch".into()))
    }

    /// Fetch one configuration section and merge it into the snapshot.
    async fn fetch_section(&self, section: ConfigSection) -> Result<(), CoreError> {
        match section {
            ConfigSection::Dnd => {
                let payload = self.inner.client.dnd().await?;
                let mut shared = self.inner.shared.lock().await;
                shared.state.dnd = Some(payload.into());
                self.publish(&shared);
            }
            ConfigSection::Phonebook => {
                let payload = self.inner.client.phonebook().await?;
                let mut shared = self.inner.shared.lock().await;
                shared.state.phonebook = Some(convert::phonebook_entries(payload));
                self.publish(&shared);
            }
            ConfigSection::Blocked => {
                let payload = self.inner.client.blocked().await?;
                let mut shared = self.inner.shared.lock().await;
                shared.state.blocked = Some(convert::blocked_numbers(payload));
                self.publish(&shared);
            }
            ConfigSection::Webhooks => {
                let payload = self.inner.client.webhooks().await?;
                let mut shared = self.inner.shared.lock().await;
                shared.state.webhooks = Some(convert::webhook_shortcuts(payload));
                self.publish(&shared);
            }
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Publish the shared state as a fresh immutable snapshot.
    /// Called with the merge lock held, so published snapshots are
    /// always fully formed.
    fn publish(&self, shared: &Shared) {
        let current = CurrentState {
            snapshot: Arc::new(shared.state.clone()),
            available: shared.health.available(),
        };
        self.inner.state_tx.send_replace(current);
    }

    /// Fold a push-channel state transition into stream health.
    async fn note_stream_state(&self, state: &StreamState) {
        let health = match state {
            StreamState::Connected => ConnectionHealth::Connected,
            StreamState::Connecting => ConnectionHealth::Reconnecting,
            StreamState::Reconnecting { attempt } if *attempt >= STREAM_FAILED_AFTER => {
                ConnectionHealth::Failed
            }
            StreamState::Reconnecting { .. } => ConnectionHealth::Reconnecting,
            StreamState::Disconnected => ConnectionHealth::Failed,
        };

        let mut shared = self.inner.shared.lock().await;
        shared.health.set_stream_health(health);
        self.publish(&shared);
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Drives the refresh cadence. Owns the RefreshPolicy exclusively.
async fn scheduler_task(
    coordinator: Coordinator,
    mut refresh_rx: mpsc::Receiver<RefreshRequest>,
    cancel: CancellationToken,
) {
    let config = coordinator.config();
    let mut policy = RefreshPolicy::new(
        config.poll_interval_clamped(),
        config.fast_interval,
        config.fast_window_cycles,
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            request = refresh_rx.recv() => {
                match request {
                    Some(RefreshRequest::Fast) => {
                        debug!(window = policy.window, "entering fast refresh mode");
                        policy.enter_fast_mode();
                        coordinator.refresh_cycle().await;
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(policy.current_interval()) => {
                coordinator.refresh_cycle().await;
                policy.complete_cycle();
            }
        }
    }

    debug!("scheduler task exiting");
}

/// Pumps the push channel into the coordinator: deltas into
/// `merge_delta`, connection transitions into stream health.
async fn stream_task(coordinator: Coordinator, cancel: CancellationToken) {
    let ws_url = match coordinator.inner.client.ws_url() {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, "push channel disabled: cannot derive ws url");
            return;
        }
    };

    let handle = PushHandle::connect(ws_url, ReconnectConfig::default(), cancel.child_token());
    let mut deltas = handle.subscribe();
    let mut stream_state = handle.state();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = stream_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = stream_state.borrow_and_update().clone();
                coordinator.note_stream_state(&state).await;
            }
            message = deltas.recv() => {
                match message {
                    Ok(delta) => coordinator.merge_delta(&delta).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "push consumer lagged, deltas dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    handle.shutdown();
    debug!("stream task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_starts_at_normal_interval() {
        let policy = RefreshPolicy::new(Duration::from_secs(60), Duration::from_secs(1), 3);
        assert_eq!(policy.current_interval(), Duration::from_secs(60));
    }

    #[test]
    fn fast_mode_lasts_exactly_the_window() {
        let mut policy = RefreshPolicy::new(Duration::from_secs(60), Duration::from_secs(1), 3);

        policy.enter_fast_mode();
        for _ in 0..3 {
            assert_eq!(policy.current_interval(), Duration::from_secs(1));
            policy.complete_cycle();
        }
        assert_eq!(policy.current_interval(), Duration::from_secs(60));
    }

    #[test]
    fn reentering_fast_mode_resets_the_window() {
        let mut policy = RefreshPolicy::new(Duration::from_secs(60), Duration::from_secs(1), 2);

        policy.enter_fast_mode();
        policy.complete_cycle();
        policy.enter_fast_mode();
        policy.complete_cycle();
        assert_eq!(policy.current_interval(), Duration::from_secs(1));
        policy.complete_cycle();
        assert_eq!(policy.current_interval(), Duration::from_secs(60));
    }

    #[test]
    fn completing_cycles_in_normal_mode_is_harmless() {
        let mut policy = RefreshPolicy::new(Duration::from_secs(60), Duration::from_secs(1), 3);
        policy.complete_cycle();
        policy.complete_cycle();
        assert_eq!(policy.current_interval(), Duration::from_secs(60));
    }
}
