use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDiskUsage {
    pub project_url: String,
    pub usage_bytes: u64,
}

/// Disk usage breakdown for the daemon's data directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskUsage {
    pub total_bytes: u64,
    pub free_bytes: u64,
    /// Bytes the daemon itself (binaries, state files) occupies.
    pub daemon_bytes: u64,
    /// Preference-derived ceiling the daemon may use, if any.
    pub allowed_bytes: Option<u64>,
    pub projects: Vec<ProjectDiskUsage>,
}

impl DiskUsage {
    pub fn project_total(&self) -> u64 {
        self.projects.iter().map(|p| p.usage_bytes).sum()
    }
}
