use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a task's files and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskState {
    #[default]
    New,
    FilesDownloading,
    FilesDownloaded,
    ComputeError,
    FilesUploading,
    FilesUploaded,
    Aborted,
    UploadFailed,
}

/// Whether the daemon's scheduler currently has the task in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SchedulerState {
    #[default]
    Uninitialized,
    Preempted,
    Scheduled,
}

/// One task (workunit result) on the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub project_url: String,
    pub workunit_name: String,
    pub state: TaskState,
    pub scheduler_state: SchedulerState,
    /// Running or preempted-in-memory right now.
    pub active: bool,
    pub fraction_done: f64,
    pub elapsed: Duration,
    pub estimated_remaining: Duration,
    pub deadline: Option<DateTime<Utc>>,
    pub suspended_via_gui: bool,
}

impl Task {
    /// Computation finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            TaskState::ComputeError
                | TaskState::FilesUploading
                | TaskState::FilesUploaded
                | TaskState::Aborted
                | TaskState::UploadFailed
        )
    }

    pub fn progress_percent(&self) -> f64 {
        (self.fraction_done * 100.0).clamp(0.0, 100.0)
    }
}
