use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-facing notice (news item, scheduler warning, client alert).
///
/// Like messages, notices carry daemon-assigned sequence numbers and
/// are fetched incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub seqno: u64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub project_name: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}
