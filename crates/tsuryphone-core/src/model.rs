// ── Domain state model ──
//
// Typed view of the device's state, decoupled from the wire payloads in
// tsuryphone-api. A `DeviceState` value is an immutable snapshot: the
// coordinator replaces it wholesale on every merge, so consumers always
// observe a fully-formed state.

use std::str::FromStr;

use serde::Serialize;
use strum::{Display, EnumString};

/// Phone state machine states reported by the firmware.
#[derive(Debug, Clone, Default, PartialEq, Eq, Display, EnumString)]
pub enum PhoneState {
    #[default]
    Startup,
    CheckHardware,
    CheckLine,
    Idle,
    InvalidNumber,
    IncomingCall,
    IncomingCallRing,
    InCall,
    Dialing,
    /// A state name newer firmware sends that this crate does not know.
    #[strum(default, to_string = "{0}")]
    Unknown(String),
}

impl PhoneState {
    /// Parse a wire state name. Unknown names are preserved, not dropped.
    pub fn from_wire(name: &str) -> Self {
        Self::from_str(name).unwrap_or_else(|_| Self::Unknown(name.to_owned()))
    }

    /// Whether a call is in progress or ringing.
    pub fn is_call_active(&self) -> bool {
        matches!(
            self,
            Self::IncomingCall | Self::IncomingCallRing | Self::InCall
        )
    }
}

impl Serialize for PhoneState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Current call details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CallState {
    pub active: bool,
    pub number: Option<String>,
    pub id: Option<u32>,
    pub has_waiting: bool,
    pub waiting_id: Option<u32>,
}

/// WiFi link details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WifiState {
    pub connected: bool,
    /// Signal strength in dBm.
    pub rssi: Option<i32>,
    pub ip: Option<String>,
    pub ssid: Option<String>,
}

/// Real-time section of the snapshot, fed by `/status` polls and push
/// deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhoneStatus {
    pub state: PhoneState,
    pub previous_state: Option<PhoneState>,
    /// Seconds since device boot.
    pub uptime_secs: Option<u64>,
    pub free_heap: Option<u64>,
    pub call: CallState,
    pub wifi: WifiState,
}

/// Lifetime counters and hardware identifiers from `/stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceStats {
    pub total_calls: u64,
    pub total_incoming_calls: u64,
    pub total_outgoing_calls: u64,
    pub total_blocked_calls: u64,
    pub total_resets: u64,
    pub cpu_freq_mhz: Option<u32>,
    pub flash_size_bytes: Option<u64>,
    pub sketch_size_bytes: Option<u64>,
}

/// Do Not Disturb configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DndConfig {
    pub force_enabled: bool,
    pub schedule_enabled: bool,
    pub start_hour: u8,
    pub start_minute: u8,
    pub end_hour: u8,
    pub end_minute: u8,
}

/// A quick-dial phonebook entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuickDialEntry {
    pub name: String,
    pub number: String,
}

/// A webhook shortcut, keyed by the dial code entered on the handset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebhookShortcut {
    pub code: String,
    pub webhook_id: String,
}

/// Authoritative device snapshot.
///
/// Sections start out `None` ("unknown") and fill in as their sources
/// deliver. `status`/`stats` come from polling and the push channel;
/// the configuration sections load on demand and refresh after the
/// actions that mutate them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub status: Option<PhoneStatus>,
    pub stats: Option<DeviceStats>,
    pub dnd: Option<DndConfig>,
    pub phonebook: Option<Vec<QuickDialEntry>>,
    pub blocked: Option<Vec<String>>,
    pub webhooks: Option<Vec<WebhookShortcut>>,
}

impl DeviceState {
    /// The current phone state, if any update has arrived yet.
    pub fn phone_state(&self) -> Option<&PhoneState> {
        self.status.as_ref().map(|s| &s.state)
    }
}
