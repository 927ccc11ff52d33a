use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credit totals for one day.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DailyStats {
    pub day: DateTime<Utc>,
    pub user_total_credit: f64,
    pub user_avg_credit: f64,
    pub host_total_credit: f64,
    pub host_avg_credit: f64,
}

/// Per-project credit history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectStatistics {
    pub project_url: String,
    pub daily: Vec<DailyStats>,
}
