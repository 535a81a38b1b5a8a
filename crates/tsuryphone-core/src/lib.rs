// tsuryphone-core: State-synchronization layer between tsuryphone-api and consumers.

pub mod action;
pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod model;
pub mod poll;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{DeviceAction, RingPattern};
pub use config::DeviceConfig;
pub use coordinator::{Coordinator, CurrentState, PendingAction};
pub use error::CoreError;
pub use health::{ConnectionHealth, HealthReport, SourceHealth};
pub use poll::{PollFetcher, PollSnapshot};
pub use stream::StateStream;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    CallState, DeviceState, DeviceStats, DndConfig, PhoneState, PhoneStatus, QuickDialEntry,
    WebhookShortcut, WifiState,
};
