// Device API surface: HTTP client + wire payload types.

mod client;
mod models;

pub use client::DeviceClient;
pub use models::{
    ActionRequest, BlockedPayload, CallDelta, CallPayload, DndPayload, PhonebookEntry,
    PhonebookPayload, StatsPayload, StatusDelta, StatusPayload, WebhookShortcut, WebhooksPayload,
    WifiDelta, WifiPayload,
};
