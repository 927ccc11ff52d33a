use serde::{Deserialize, Serialize};

use super::{Project, Task, VersionInfo};

/// Static description of the machine the daemon runs on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostInfo {
    pub domain_name: String,
    pub os_name: String,
    pub os_version: String,
    pub cpu_count: u32,
    pub cpu_model: String,
    pub memory_bytes: u64,
}

/// The daemon's full state snapshot.
///
/// Expensive to fetch and to decode; refreshed on an hour-scale cadence
/// and immediately after (re)connecting. The per-list polls keep the
/// fast-changing parts current between full fetches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientState {
    pub host_info: HostInfo,
    pub platform: String,
    pub daemon_version: VersionInfo,
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
}
