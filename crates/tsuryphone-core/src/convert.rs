// ── Wire -> domain conversion and overlay merge ──
//
// Poll payloads convert into fresh domain sections (complete snapshots,
// so they replace wholesale). Push deltas overlay field-by-field onto
// the previous status, with nested merges for the call and wifi blocks,
// so fields absent from an update carry over unchanged.

use tsuryphone_api::device::{
    BlockedPayload, CallDelta, DndPayload, PhonebookPayload, StatsPayload, StatusDelta,
    StatusPayload, WebhooksPayload, WifiDelta,
};

use crate::model::{
    CallState, DeviceStats, DndConfig, PhoneState, PhoneStatus, QuickDialEntry, WebhookShortcut,
    WifiState,
};

// ── Full-payload conversions ─────────────────────────────────────────

impl From<StatusPayload> for PhoneStatus {
    fn from(payload: StatusPayload) -> Self {
        Self {
            state: PhoneState::from_wire(&payload.state),
            previous_state: payload.previous_state.as_deref().map(PhoneState::from_wire),
            uptime_secs: payload.uptime,
            free_heap: payload.free_heap,
            call: CallState {
                active: payload.call.active,
                number: payload.call.number,
                id: payload.call.id,
                has_waiting: payload.call.has_waiting,
                waiting_id: payload.call.waiting_id,
            },
            wifi: WifiState {
                connected: payload.wifi.connected,
                rssi: payload.wifi.rssi,
                ip: payload.wifi.ip,
                ssid: payload.wifi.ssid,
            },
        }
    }
}

impl From<StatsPayload> for DeviceStats {
    fn from(payload: StatsPayload) -> Self {
        Self {
            total_calls: payload.total_calls,
            total_incoming_calls: payload.total_incoming_calls,
            total_outgoing_calls: payload.total_outgoing_calls,
            total_blocked_calls: payload.total_blocked_calls,
            total_resets: payload.total_resets,
            cpu_freq_mhz: payload.cpu_freq,
            flash_size_bytes: payload.flash_size,
            sketch_size_bytes: payload.sketch_size,
        }
    }
}

impl From<DndPayload> for DndConfig {
    fn from(payload: DndPayload) -> Self {
        Self {
            force_enabled: payload.force_enabled,
            schedule_enabled: payload.schedule_enabled,
            start_hour: payload.start_hour,
            start_minute: payload.start_minute,
            end_hour: payload.end_hour,
            end_minute: payload.end_minute,
        }
    }
}

pub fn phonebook_entries(payload: PhonebookPayload) -> Vec<QuickDialEntry> {
    payload
        .entries
        .into_iter()
        .map(|e| QuickDialEntry {
            name: e.name,
            number: e.number,
        })
        .collect()
}

pub fn blocked_numbers(payload: BlockedPayload) -> Vec<String> {
    payload.blocked_numbers
}

pub fn webhook_shortcuts(payload: WebhooksPayload) -> Vec<WebhookShortcut> {
    payload
        .webhooks
        .into_iter()
        .map(|w| WebhookShortcut {
            code: w.code,
            webhook_id: w.webhook_id,
        })
        .collect()
}

// ── Delta overlay ────────────────────────────────────────────────────

/// Overlay a push delta onto the previous status.
///
/// Only fields the delta declares are touched; everything else keeps
/// its previous value. The call and wifi blocks merge at the nested
/// field level so a `{"wifi": {"rssi": -70}}` update does not wipe the
/// SSID.
pub fn apply_status_delta(status: &mut PhoneStatus, delta: &StatusDelta) {
    if let Some(ref state) = delta.state {
        status.state = PhoneState::from_wire(state);
    }
    if let Some(ref previous) = delta.previous_state {
        status.previous_state = Some(PhoneState::from_wire(previous));
    }
    if let Some(uptime) = delta.uptime {
        status.uptime_secs = Some(uptime);
    }
    if let Some(free_heap) = delta.free_heap {
        status.free_heap = Some(free_heap);
    }
    if let Some(ref call) = delta.call {
        apply_call_delta(&mut status.call, call);
    }
    if let Some(ref wifi) = delta.wifi {
        apply_wifi_delta(&mut status.wifi, wifi);
    }
}

fn apply_call_delta(call: &mut CallState, delta: &CallDelta) {
    if let Some(active) = delta.active {
        call.active = active;
    }
    if let Some(ref number) = delta.number {
        call.number = Some(number.clone());
    }
    if let Some(id) = delta.id {
        call.id = Some(id);
    }
    if let Some(has_waiting) = delta.has_waiting {
        call.has_waiting = has_waiting;
    }
    if let Some(waiting_id) = delta.waiting_id {
        call.waiting_id = Some(waiting_id);
    }
}

fn apply_wifi_delta(wifi: &mut WifiState, delta: &WifiDelta) {
    if let Some(connected) = delta.connected {
        wifi.connected = connected;
    }
    if let Some(rssi) = delta.rssi {
        wifi.rssi = Some(rssi);
    }
    if let Some(ref ip) = delta.ip {
        wifi.ip = Some(ip.clone());
    }
    if let Some(ref ssid) = delta.ssid {
        wifi.ssid = Some(ssid.clone());
    }
}
