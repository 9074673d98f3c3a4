//! Service health and statistics payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::video::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub services: ServiceHealth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<HealthStats>,
}

/// Backing service states, e.g. `connected`, `unavailable`, `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub database: String,
    pub redis: String,
    pub storage: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthStats {
    pub total_videos: u64,
    pub videos_ready: u64,
    pub videos_processing: u64,
    pub videos_failed: u64,
    pub queue_size: u64,
    pub storage_used: String,
}

/// `GET /stats`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceStats {
    pub overview: StatsOverview,
    pub processing_stats: ProcessingStats,
    pub popular_resolutions: Vec<ResolutionCount>,
    pub recent_activity: RecentActivity,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsOverview {
    pub total_videos: u64,
    pub total_views: u64,
    pub total_storage_used: u64,
    pub average_processing_time: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessingStats {
    pub videos_ready: u64,
    pub videos_processing: u64,
    pub videos_pending: u64,
    pub videos_failed: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionCount {
    pub resolution: Resolution,
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecentActivity {
    pub uploads_today: u64,
    pub uploads_this_week: u64,
    pub processing_time_today: f64,
}
