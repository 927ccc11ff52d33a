// gridmon-core: Synchronization engine between gridmon-rpc and the UI.

pub mod cache;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod kind;
pub mod monitor;

pub(crate) mod executor;
pub(crate) mod scheduler;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cache::{CacheEntry, MessageLog, NoticeLog, ResourceCache, SlotMeta};
pub use command::Command;
pub use config::EngineConfig;
pub use connection::{ConnectionError, ConnectionState};
pub use error::CoreError;
pub use kind::{ResourceKind, ViewKind, ViewMask};
pub use monitor::{CommandHandle, Monitor, TickReport};
pub use scheduler::IntervalTable;
