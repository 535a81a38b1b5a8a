// Device wire types
//
// Models for the TsuryPhone's JSON endpoints. Responses are bare JSON
// objects (no envelope). Fields use `#[serde(default)]` liberally because
// the firmware omits fields it considers uninteresting for the current
// state, and the WebSocket sends arbitrary subsets of the same schema.

use serde::{Deserialize, Serialize};

// ── /status ──────────────────────────────────────────────────────────

/// Full payload from `GET /status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusPayload {
    /// Current phone state machine name, e.g. `"Idle"`, `"InCall"`.
    #[serde(default)]
    pub state: String,

    #[serde(default)]
    pub previous_state: Option<String>,

    /// Seconds since boot.
    #[serde(default)]
    pub uptime: Option<u64>,

    /// Free heap bytes on the device.
    #[serde(default)]
    pub free_heap: Option<u64>,

    #[serde(default)]
    pub call: CallPayload,

    #[serde(default)]
    pub wifi: WifiPayload,
}

/// Call block inside `/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallPayload {
    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub number: Option<String>,

    #[serde(default)]
    pub id: Option<u32>,

    #[serde(default)]
    pub has_waiting: bool,

    #[serde(default)]
    pub waiting_id: Option<u32>,
}

/// WiFi block inside `/status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiPayload {
    #[serde(default)]
    pub connected: bool,

    /// Signal strength in dBm.
    #[serde(default)]
    pub rssi: Option<i32>,

    #[serde(default)]
    pub ip: Option<String>,

    #[serde(default)]
    pub ssid: Option<String>,
}

// ── /stats ───────────────────────────────────────────────────────────

/// Payload from `GET /stats`: lifetime counters and hardware identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsPayload {
    #[serde(default)]
    pub total_calls: u64,

    #[serde(default)]
    pub total_incoming_calls: u64,

    #[serde(default)]
    pub total_outgoing_calls: u64,

    #[serde(default)]
    pub total_blocked_calls: u64,

    #[serde(default)]
    pub total_resets: u64,

    /// CPU frequency in MHz.
    #[serde(default)]
    pub cpu_freq: Option<u32>,

    #[serde(default)]
    pub flash_size: Option<u64>,

    #[serde(default)]
    pub sketch_size: Option<u64>,
}

// ── /dnd ─────────────────────────────────────────────────────────────

/// Payload from `GET /dnd`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DndPayload {
    #[serde(default)]
    pub force_enabled: bool,

    #[serde(default)]
    pub schedule_enabled: bool,

    #[serde(default)]
    pub start_hour: u8,

    #[serde(default)]
    pub start_minute: u8,

    #[serde(default)]
    pub end_hour: u8,

    #[serde(default)]
    pub end_minute: u8,
}

// ── /phonebook, /blocked, /webhooks ──────────────────────────────────

/// Payload from `GET /phonebook`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonebookPayload {
    #[serde(default)]
    pub entries: Vec<PhonebookEntry>,
}

/// A quick-dial entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhonebookEntry {
    pub name: String,
    pub number: String,
}

/// Payload from `GET /blocked`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedPayload {
    #[serde(default)]
    pub blocked_numbers: Vec<String>,
}

/// Payload from `GET /webhooks`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhooksPayload {
    #[serde(default)]
    pub webhooks: Vec<WebhookShortcut>,
}

/// A webhook shortcut. Shortcuts are keyed by the dial code the handset
/// enters, which the firmware calls `number`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookShortcut {
    #[serde(rename = "number")]
    pub code: String,

    pub webhook_id: String,
}

// ── WebSocket deltas ─────────────────────────────────────────────────

/// A partial status update from the push channel.
///
/// Schema-compatible with [`StatusPayload`] but every field is optional:
/// the firmware sends only what changed. Absent fields must be carried
/// over from the previous snapshot by the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_heap: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call: Option<CallDelta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiDelta>,
}

impl StatusDelta {
    /// Returns `true` if the delta carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Partial call block in a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_waiting: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_id: Option<u32>,
}

/// Partial WiFi block in a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssid: Option<String>,
}

// ── /action ──────────────────────────────────────────────────────────

/// Body for `POST /action`: `{"action": <name>, ...params}`.
///
/// Every outbound command rides this unified dispatch. Parameters are
/// flattened next to the action name, matching the firmware's parser.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRequest {
    pub action: String,

    #[serde(flatten)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ActionRequest {
    /// A parameterless action.
    pub fn bare(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: serde_json::Map::new(),
        }
    }
}
