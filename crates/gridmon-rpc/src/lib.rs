// gridmon-rpc: Blocking RPC channel contract for the compute-client daemon.
//
// This crate defines the boundary the sync engine programs against:
// typed request/reply descriptors, the decoded payload model, daemon
// result codes, and the channel/connector traits. The wire encoding
// of individual calls lives behind `RpcChannel` implementations and
// is not part of this crate.

pub mod channel;
pub mod error;
pub mod model;
pub mod request;

pub use channel::{ConnectTarget, GUI_RPC_PORT, RpcChannel, RpcConnector};
pub use error::{ResultCode, RpcError};
pub use request::{ProjectAction, RpcReply, RpcRequest, TaskAction, TransferAction};
