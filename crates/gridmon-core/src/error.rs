// ── Core error types ──
//
// User-facing errors from the sync engine. Consumers never see raw
// transport failures; the `From<RpcError>` impl translates channel
// errors into the engine's taxonomy. Isolated per-resource failures
// are NOT errors here -- they are recorded in the cache slot's result
// code and the stale snapshot stays visible.

use thiserror::Error;

use gridmon_rpc::error::{ResultCode, RpcError};
use gridmon_rpc::model::VersionInfo;

/// Unified error type for the engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The daemon cannot be reached or the channel dropped mid-exchange.
    #[error("daemon unreachable: {reason}")]
    TransportUnavailable { reason: String },

    /// Wrong RPC password. Distinct from transport failure because the
    /// remediation differs: prompt for a credential, don't retry.
    #[error("authentication failed (default credential used: {used_default_credential})")]
    AuthFailed { used_default_credential: bool },

    /// Daemon speaks an incompatible RPC protocol generation.
    #[error("daemon version {daemon} is not compatible with client {client}")]
    VersionMismatch {
        daemon: VersionInfo,
        client: VersionInfo,
    },

    /// The daemon asked the manager to exit. Fatal for a local daemon;
    /// never retried.
    #[error("the daemon requested manager shutdown")]
    DaemonRequestedShutdown,

    /// A single request was rejected without breaking the channel.
    #[error("request failed (code {code})")]
    RequestFailed { code: ResultCode },

    /// Operation requires a connected daemon.
    #[error("not connected to a daemon")]
    Disconnected,

    /// No request has completed within the stall window; the worker is
    /// likely hung inside a blocking call.
    #[error("engine stalled waiting on the daemon")]
    Stalled,
}

impl From<RpcError> for CoreError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transport { reason } => Self::TransportUnavailable { reason },
            RpcError::AuthenticationFailed => Self::AuthFailed {
                used_default_credential: false,
            },
            RpcError::Daemon(code) => Self::RequestFailed { code },
            RpcError::UnexpectedReply { request } => Self::TransportUnavailable {
                reason: format!("unexpected reply for {request}"),
            },
        }
    }
}
