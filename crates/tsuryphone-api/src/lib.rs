// tsuryphone-api: Async Rust client for the TsuryPhone device API (HTTP + WebSocket)

pub mod device;
pub mod error;
pub mod transport;
pub mod websocket;

pub use device::DeviceClient;
pub use error::Error;
