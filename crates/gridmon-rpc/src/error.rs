use thiserror::Error;

/// Numeric status returned by the daemon for a single request.
///
/// Zero is success. Non-zero codes are opaque to the engine except for
/// the small recognized subset below, which drives connection-lifecycle
/// decisions (reconnect vs. surface to the user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResultCode(pub i32);

impl ResultCode {
    pub const SUCCESS: Self = Self(0);

    /// Socket read failed mid-exchange.
    pub const READ_FAILED: Self = Self(-103);
    /// Socket write failed mid-exchange.
    pub const WRITE_FAILED: Self = Self(-104);
    /// Could not reach the daemon at all.
    pub const CONNECT_FAILED: Self = Self(-107);
    /// The daemon rejected the supplied password.
    pub const AUTH_FAILED: Self = Self(-155);
    /// The daemon has asked its manager to exit.
    pub const QUIT_REQUESTED: Self = Self(-213);

    pub fn is_success(self) -> bool {
        self.0 == 0
    }

    /// Whether this code means the channel itself is unusable, as
    /// opposed to a single request being rejected.
    pub fn is_channel_broken(self) -> bool {
        matches!(
            self,
            Self::READ_FAILED | Self::WRITE_FAILED | Self::CONNECT_FAILED
        )
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failure of a single request/response exchange with the daemon.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The connection dropped, timed out, or could not be established.
    #[error("transport failure: {reason}")]
    Transport { reason: String },

    /// The daemon rejected the supplied password.
    #[error("daemon rejected the RPC password")]
    AuthenticationFailed,

    /// The daemon answered with a non-zero status for this request.
    #[error("daemon rejected request (code {0})")]
    Daemon(ResultCode),

    /// The channel returned a reply of the wrong shape for the request.
    #[error("unexpected reply for {request}")]
    UnexpectedReply { request: &'static str },
}

impl RpcError {
    /// The result code to record in the cache slot for this failure.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Transport { .. } => ResultCode::READ_FAILED,
            Self::AuthenticationFailed => ResultCode::AUTH_FAILED,
            Self::Daemon(code) => *code,
            Self::UnexpectedReply { .. } => ResultCode::READ_FAILED,
        }
    }

    /// Whether this failure means the channel must be torn down.
    pub fn is_channel_broken(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::UnexpectedReply { .. } => true,
            Self::AuthenticationFailed => false,
            Self::Daemon(code) => code.is_channel_broken(),
        }
    }
}
