use serde::{Deserialize, Serialize};

/// Activity mode for computation, GPU use, or network use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunMode {
    /// Run regardless of user preferences.
    Always,
    /// Run according to preferences (idle detection, time-of-day).
    #[default]
    Auto,
    /// Fully suspended.
    Never,
}

/// Why an activity class is currently suspended, if it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SuspendReason {
    #[default]
    NotSuspended,
    Batteries,
    UserActive,
    UserRequest,
    TimeOfDay,
    Benchmarks,
    DiskSize,
    CpuThrottle,
    NoRecentInput,
    OsShutdown,
}

/// Daemon-wide status snapshot. Cheap to fetch; polled every tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CcStatus {
    pub task_mode: RunMode,
    /// Mode that `task_mode` reverts to when a temporary override expires.
    pub task_mode_perm: RunMode,
    pub gpu_mode: RunMode,
    pub gpu_mode_perm: RunMode,
    pub network_mode: RunMode,
    pub network_mode_perm: RunMode,
    pub task_suspend_reason: SuspendReason,
    pub network_suspend_reason: SuspendReason,
    /// The daemon wants its manager process to exit.
    pub manager_must_quit: bool,
    /// The daemon has network connectivity.
    pub network_available: bool,
}

impl CcStatus {
    pub fn computation_suspended(&self) -> bool {
        self.task_suspend_reason != SuspendReason::NotSuspended
    }

    pub fn network_suspended(&self) -> bool {
        self.network_suspend_reason != SuspendReason::NotSuspended
    }
}
