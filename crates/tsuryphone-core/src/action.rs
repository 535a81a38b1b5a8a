// ── Action API ──
//
// All write operations flow through a unified `DeviceAction` enum that
// encodes to the firmware's `POST /action` dispatch:
// `{"action": <name>, ...params}`.

use std::str::FromStr;

use serde_json::json;
use tsuryphone_api::device::ActionRequest;

use crate::error::CoreError;

// Ring-pattern limits enforced before anything reaches the device.
const MAX_DURATION_MS: u32 = 30_000;
const MAX_REPEATS: u32 = 100;

/// A parsed ring pattern: alternating ring/pause durations plus a
/// repeat count.
///
/// Accepted text forms:
/// - `"2500,500,500,500x3"` -> durations `[2500,500,500,500]`, repeats 3
/// - `"1000,200,1000"` -> durations `[1000,200,1000]`, repeats 1
/// - `"500,300/5"` -> durations `[500,300]`, repeats 5
///
/// A repeated pattern must alternate ring/pause cleanly, so the
/// duration count has to be even whenever repeats > 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingPattern {
    pub durations: Vec<u32>,
    pub repeats: u32,
}

impl FromStr for RingPattern {
    type Err = CoreError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CoreError::InvalidRingPattern {
            pattern: pattern.to_owned(),
            reason: reason.to_owned(),
        };

        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty pattern"));
        }

        // Repeat suffix: `...x3` or `.../3`.
        let (main, repeats) = match trimmed.rsplit_once(['x', '/']) {
            Some((main, count)) => {
                let repeats: u32 = count
                    .trim()
                    .parse()
                    .map_err(|_| invalid("repeat count is not a number"))?;
                (main, repeats)
            }
            None => (trimmed, 1),
        };

        if repeats == 0 || repeats > MAX_REPEATS {
            return Err(invalid("repeat count out of range"));
        }

        let mut durations = Vec::new();
        for part in main.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let duration: u32 = part
                .parse()
                .map_err(|_| invalid("duration is not a number"))?;
            if duration == 0 || duration > MAX_DURATION_MS {
                return Err(invalid("duration out of range"));
            }
            durations.push(duration);
        }

        if durations.is_empty() {
            return Err(invalid("no durations"));
        }

        // Repeated patterns must alternate ring/pause cleanly.
        if repeats > 1 && durations.len() % 2 != 0 {
            return Err(invalid(
                "repeated pattern needs an even number of durations",
            ));
        }

        Ok(Self { durations, repeats })
    }
}

/// Configuration section an action invalidates, re-fetched after the
/// action succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigSection {
    Dnd,
    Phonebook,
    Blocked,
    Webhooks,
}

/// All outbound commands against the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAction {
    // ── Calls ────────────────────────────────────────────────────────
    /// Dial an arbitrary number.
    CallCustom { number: String },
    Hangup,
    SwitchToCallWaiting,
    /// Ring the handset with a specific pattern.
    Ring { pattern: RingPattern },

    // ── Do Not Disturb ───────────────────────────────────────────────
    SetDndForce { enabled: bool },
    SetDndSchedule { enabled: bool },
    SetDndHours {
        start_hour: u8,
        start_minute: u8,
        end_hour: u8,
        end_minute: u8,
    },

    // ── Phonebook / blocklist ────────────────────────────────────────
    AddQuickDial { name: String, number: String },
    RemoveQuickDial { name: String },
    BlockNumber { number: String },
    UnblockNumber { number: String },

    // ── Webhook shortcuts ────────────────────────────────────────────
    AddWebhookShortcut { code: String, webhook_id: String },
    RemoveWebhookShortcut { code: String },

    // ── Maintenance ──────────────────────────────────────────────────
    SetMaintenanceMode { enabled: bool },
    ClearLogs,
    /// Ask the firmware to push a fresh full state.
    ForceRefresh,
    Reset,
}

impl DeviceAction {
    /// The wire name used in the `action` field.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::CallCustom { .. } => "call_custom",
            Self::Hangup => "hangup",
            Self::SwitchToCallWaiting => "call_waiting",
            Self::Ring { .. } => "ring_pattern",
            Self::SetDndForce { .. } => "dnd",
            Self::SetDndSchedule { .. } => "dnd_schedule",
            Self::SetDndHours { .. } => "dnd_hours",
            Self::AddQuickDial { .. } => "quick_dial_add",
            Self::RemoveQuickDial { .. } => "quick_dial_remove",
            Self::BlockNumber { .. } => "blocked_add",
            Self::UnblockNumber { .. } => "blocked_remove",
            Self::AddWebhookShortcut { .. } => "webhook_add",
            Self::RemoveWebhookShortcut { .. } => "webhook_remove",
            Self::SetMaintenanceMode { .. } => "maintenance",
            Self::ClearLogs => "clear_logs",
            Self::ForceRefresh => "refresh",
            Self::Reset => "reset",
        }
    }

    /// Encode into the unified `POST /action` body.
    pub fn to_request(&self) -> ActionRequest {
        let params = match self {
            Self::CallCustom { number }
            | Self::BlockNumber { number }
            | Self::UnblockNumber { number } => json!({"number": number}),
            Self::Ring { pattern } => {
                json!({"durations": pattern.durations, "repeats": pattern.repeats})
            }
            Self::SetDndForce { enabled }
            | Self::SetDndSchedule { enabled }
            | Self::SetMaintenanceMode { enabled } => json!({"enabled": enabled}),
            Self::SetDndHours {
                start_hour,
                start_minute,
                end_hour,
                end_minute,
            } => json!({
                "start_hour": start_hour,
                "start_minute": start_minute,
                "end_hour": end_hour,
                "end_minute": end_minute,
            }),
            Self::AddQuickDial { name, number } => json!({"name": name, "number": number}),
            Self::RemoveQuickDial { name } => json!({"name": name}),
            // Webhook shortcuts are keyed by dial code, which the
            // firmware calls `number`.
            Self::AddWebhookShortcut { code, webhook_id } => {
                json!({"number": code, "webhook_id": webhook_id})
            }
            Self::RemoveWebhookShortcut { code } => json!({"number": code}),
            Self::Hangup
            | Self::SwitchToCallWaiting
            | Self::ClearLogs
            | Self::ForceRefresh
            | Self::Reset => json!({}),
        };

        let params = match params {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        ActionRequest {
            action: self.wire_name().to_owned(),
            params,
        }
    }

    /// The configuration section this action mutates, if any.
    pub(crate) fn refresh_section(&self) -> Option<ConfigSection> {
        match self {
            Self::SetDndForce { .. } | Self::SetDndSchedule { .. } | Self::SetDndHours { .. } => {
                Some(ConfigSection::Dnd)
            }
            Self::AddQuickDial { .. } | Self::RemoveQuickDial { .. } => {
                Some(ConfigSection::Phonebook)
            }
            Self::BlockNumber { .. } | Self::UnblockNumber { .. } => Some(ConfigSection::Blocked),
            Self::AddWebhookShortcut { .. } | Self::RemoveWebhookShortcut { .. } => {
                Some(ConfigSection::Webhooks)
            }
            _ => None,
        }
    }
}
