// The channel contract the sync engine consumes.
//
// An `RpcChannel` performs one blocking request/response exchange per
// call. An `RpcConnector` dials the daemon and hands back a channel.
// Both are implemented elsewhere (TCP transport, test doubles); the
// engine only ever sees these traits.

use crate::error::RpcError;
use crate::request::{RpcReply, RpcRequest};

/// Default GUI RPC listen port of the daemon.
pub const GUI_RPC_PORT: u16 = 31416;

/// Where to find the daemon.
///
/// An empty host means "the daemon on this machine". Local targets get
/// more forgiving connect behavior (the daemon may still be starting).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
}

impl ConnectTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// A target for the daemon on this machine.
    pub fn local(port: u16) -> Self {
        Self::new("localhost", port)
    }

    /// Whether this target resolves to the local machine.
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "" | "localhost" | "127.0.0.1" | "::1")
    }
}

impl std::fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.is_empty() {
            write!(f, "localhost:{}", self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// One established connection to the daemon.
///
/// `execute` blocks for the lifetime of a single round trip and is not
/// preemptively cancellable; a hung call is recovered only by dropping
/// the channel and dialing again.
pub trait RpcChannel: Send {
    fn execute(&mut self, request: &RpcRequest) -> Result<RpcReply, RpcError>;
}

/// Dials the daemon. Implemented by the transport layer (or a test
/// double); the engine calls `open` once per connection attempt.
pub trait RpcConnector: Send + Sync {
    fn open(&self, target: &ConnectTarget) -> Result<Box<dyn RpcChannel>, RpcError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn loopback_targets_are_local() {
        assert!(ConnectTarget::new("", GUI_RPC_PORT).is_local());
        assert!(ConnectTarget::new("localhost", GUI_RPC_PORT).is_local());
        assert!(ConnectTarget::new("127.0.0.1", GUI_RPC_PORT).is_local());
        assert!(ConnectTarget::new("::1", GUI_RPC_PORT).is_local());
        assert!(!ConnectTarget::new("farm-07.example.org", GUI_RPC_PORT).is_local());
    }

    #[test]
    fn display_names_empty_host_as_localhost() {
        let target = ConnectTarget::new("", 31416);
        assert_eq!(target.to_string(), "localhost:31416");
    }
}
