// ── Decoded daemon payloads ──
//
// One module per resource kind, plus the shared mode/version types.
// All types are plain data with serde derives; the engine caches them
// verbatim and the UI renders them.

mod acct_mgr;
mod disk;
mod message;
mod notice;
mod project;
mod state;
mod stats;
mod status;
mod task;
mod transfer;
mod version;

pub use acct_mgr::AcctMgrInfo;
pub use disk::{DiskUsage, ProjectDiskUsage};
pub use message::{Message, MessagePriority};
pub use notice::Notice;
pub use project::Project;
pub use state::{ClientState, HostInfo};
pub use stats::{DailyStats, ProjectStatistics};
pub use status::{CcStatus, RunMode, SuspendReason};
pub use task::{SchedulerState, Task, TaskState};
pub use transfer::{FileTransfer, TransferDirection};
pub use version::VersionInfo;
