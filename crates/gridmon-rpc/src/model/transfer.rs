use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Upload,
    Download,
}

/// One pending or active file transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileTransfer {
    pub name: String,
    pub project_url: String,
    pub direction: TransferDirection,
    pub bytes_total: u64,
    pub bytes_transferred: u64,
    /// A transfer attempt is running right now.
    pub active: bool,
    pub retry_count: u32,
    /// Backoff: no retry before this time.
    pub next_request_at: Option<DateTime<Utc>>,
}

impl FileTransfer {
    pub fn fraction_done(&self) -> f64 {
        if self.bytes_total == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let fraction = self.bytes_transferred as f64 / self.bytes_total as f64;
            fraction.clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn transfer(total: u64, done: u64) -> FileTransfer {
        FileTransfer {
            name: "wu_123_0_r1".into(),
            project_url: "https://grid.example.org/".into(),
            direction: TransferDirection::Upload,
            bytes_total: total,
            bytes_transferred: done,
            active: false,
            retry_count: 0,
            next_request_at: None,
        }
    }

    #[test]
    fn fraction_handles_zero_total() {
        assert!((transfer(0, 0).fraction_done() - 0.0).abs() < f64::EPSILON);
        assert!((transfer(100, 50).fraction_done() - 0.5).abs() < f64::EPSILON);
    }
}
