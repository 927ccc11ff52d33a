// Typed request/reply descriptors.
//
// Every exchange with the daemon is one `RpcRequest` variant paired
// with one `RpcReply` shape. The engine's scheduler and executor work
// entirely in terms of these; nothing here knows the wire encoding.

use std::time::Duration;

use secrecy::SecretString;

use crate::model::{
    AcctMgrInfo, CcStatus, ClientState, DiskUsage, FileTransfer, Message, Notice, Project,
    ProjectStatistics, RunMode, Task, VersionInfo,
};

/// Operations on an attached project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ProjectAction {
    Suspend,
    Resume,
    Update,
    Reset,
    Detach,
    NoMoreWork,
    AllowMoreWork,
}

/// Operations on a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TaskAction {
    Suspend,
    Resume,
    Abort,
}

/// Operations on a single file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransferAction {
    Retry,
    Abort,
}

/// One request to the daemon.
#[derive(Debug, Clone)]
pub enum RpcRequest {
    // ── Handshake / control ──────────────────────────────────────────
    ExchangeVersions { client: VersionInfo },
    Authorize { password: SecretString },
    SetLanguage { language: String },

    // ── Resource fetches ─────────────────────────────────────────────
    GetStatus,
    GetProjects,
    GetTasks { active_only: bool },
    GetTransfers,
    /// Messages after `seqno`; the daemon's buffer is bounded, so the
    /// caller must poll often enough not to lose entries.
    GetMessages { seqno: u64 },
    GetNotices { seqno: u64 },
    GetStatistics,
    GetDiskUsage,
    GetAcctMgrInfo,
    GetState,

    // ── Commands ─────────────────────────────────────────────────────
    ProjectOp {
        url: String,
        action: ProjectAction,
    },
    TaskOp {
        project_url: String,
        name: String,
        action: TaskAction,
    },
    TransferOp {
        project_url: String,
        name: String,
        action: TransferAction,
    },
    SetRunMode {
        mode: RunMode,
        duration: Option<Duration>,
    },
    SetGpuMode {
        mode: RunMode,
        duration: Option<Duration>,
    },
    SetNetworkMode {
        mode: RunMode,
        duration: Option<Duration>,
    },
    ReadPreferencesOverride,
    RunBenchmarks,
    NetworkAvailable,
    QuitDaemon,
}

impl RpcRequest {
    /// Short name for logging and error reporting.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExchangeVersions { .. } => "exchange_versions",
            Self::Authorize { .. } => "authorize",
            Self::SetLanguage { .. } => "set_language",
            Self::GetStatus => "get_status",
            Self::GetProjects => "get_projects",
            Self::GetTasks { .. } => "get_tasks",
            Self::GetTransfers => "get_transfers",
            Self::GetMessages { .. } => "get_messages",
            Self::GetNotices { .. } => "get_notices",
            Self::GetStatistics => "get_statistics",
            Self::GetDiskUsage => "get_disk_usage",
            Self::GetAcctMgrInfo => "get_acct_mgr_info",
            Self::GetState => "get_state",
            Self::ProjectOp { .. } => "project_op",
            Self::TaskOp { .. } => "task_op",
            Self::TransferOp { .. } => "transfer_op",
            Self::SetRunMode { .. } => "set_run_mode",
            Self::SetGpuMode { .. } => "set_gpu_mode",
            Self::SetNetworkMode { .. } => "set_network_mode",
            Self::ReadPreferencesOverride => "read_preferences_override",
            Self::RunBenchmarks => "run_benchmarks",
            Self::NetworkAvailable => "network_available",
            Self::QuitDaemon => "quit_daemon",
        }
    }
}

/// Decoded payload of a successful exchange.
#[derive(Debug, Clone)]
pub enum RpcReply {
    Version(VersionInfo),
    Authorized,
    Status(CcStatus),
    Projects(Vec<Project>),
    Tasks(Vec<Task>),
    Transfers(Vec<FileTransfer>),
    Messages(Vec<Message>),
    Notices(Vec<Notice>),
    Statistics(Vec<ProjectStatistics>),
    DiskUsage(DiskUsage),
    AcctMgrInfo(AcctMgrInfo),
    State(ClientState),
    /// Command acknowledged; no payload.
    Ack,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn actions_display_in_snake_case() {
        assert_eq!(ProjectAction::NoMoreWork.to_string(), "no_more_work");
        assert_eq!(TaskAction::Abort.to_string(), "abort");
        assert_eq!(TransferAction::Retry.to_string(), "retry");
    }

    #[test]
    fn request_names_are_stable() {
        assert_eq!(RpcRequest::GetStatus.name(), "get_status");
        assert_eq!(RpcRequest::GetMessages { seqno: 7 }.name(), "get_messages");
    }
}
