use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessagePriority {
    Info,
    UserAlert,
    InternalError,
}

/// One log message from the daemon.
///
/// Sequence numbers are assigned by the daemon and strictly increase;
/// the fetch protocol is "everything after seqno N". The daemon's own
/// buffer is bounded, so a client that polls too rarely loses entries
/// permanently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub seqno: u64,
    pub project: String,
    pub priority: MessagePriority,
    pub timestamp: DateTime<Utc>,
    pub body: String,
}
