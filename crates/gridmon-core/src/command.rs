// ── Command API ──
//
// All daemon write operations flow through one `Command` enum. The
// executor routes each variant to its RPC request and, on success,
// invalidates the cache slots the mutation touches so the next tick
// re-fetches them immediately.

use std::time::Duration;

use gridmon_rpc::model::RunMode;
use gridmon_rpc::request::{ProjectAction, RpcRequest, TaskAction, TransferAction};

use crate::kind::ResourceKind;

/// A user-issued write operation against the daemon.
#[derive(Debug, Clone)]
pub enum Command {
    Project {
        url: String,
        action: ProjectAction,
    },
    Task {
        project_url: String,
        name: String,
        action: TaskAction,
    },
    Transfer {
        project_url: String,
        name: String,
        action: TransferAction,
    },
    SetRunMode {
        mode: RunMode,
        /// Temporary override; `None` makes the change permanent.
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
    /// Re-read the local preferences override file.
    ReadPreferencesOverride,
    RunBenchmarks,
    /// Tell the daemon the network is up (for dial-on-demand setups).
    NetworkAvailable,
    QuitDaemon,
}

impl Command {
    pub(crate) fn to_request(&self) -> RpcRequest {
        match self {
            Self::Project { url, action } => RpcRequest::ProjectOp {
                url: url.clone(),
                action: *action,
            },
            Self::Task {
                project_url,
                name,
                action,
            } => RpcRequest::TaskOp {
                project_url: project_url.clone(),
                name: name.clone(),
                action: *action,
            },
            Self::Transfer {
                project_url,
                name,
                action,
            } => RpcRequest::TransferOp {
                project_url: project_url.clone(),
                name: name.clone(),
                action: *action,
            },
            Self::SetRunMode { mode, duration } => RpcRequest::SetRunMode {
                mode: *mode,
                duration: *duration,
            },
            Self::SetGpuMode { mode, duration } => RpcRequest::SetGpuMode {
                mode: *mode,
                duration: *duration,
            },
            Self::SetNetworkMode { mode, duration } => RpcRequest::SetNetworkMode {
                mode: *mode,
                duration: *duration,
            },
            Self::ReadPreferencesOverride => RpcRequest::ReadPreferencesOverride,
            Self::RunBenchmarks => RpcRequest::RunBenchmarks,
            Self::NetworkAvailable => RpcRequest::NetworkAvailable,
            Self::QuitDaemon => RpcRequest::QuitDaemon,
        }
    }

    /// Cache slots this mutation makes stale on success.
    pub fn invalidates(&self) -> &'static [ResourceKind] {
        match self {
            // Project-level changes ripple into the task list.
            Self::Project { .. } => &[ResourceKind::Projects, ResourceKind::Tasks],
            Self::Task { .. } => &[ResourceKind::Tasks],
            Self::Transfer { .. } => &[ResourceKind::Transfers],
            Self::SetRunMode { .. } | Self::SetGpuMode { .. } => &[ResourceKind::Status],
            Self::SetNetworkMode { .. } | Self::NetworkAvailable => {
                &[ResourceKind::Status, ResourceKind::Transfers]
            }
            Self::ReadPreferencesOverride | Self::RunBenchmarks => &[ResourceKind::Status],
            Self::QuitDaemon => &[],
        }
    }
}
