use serde::Serialize;

use crate::core::time::format_primitive;
use crate::db::models::TestAnalytics;
use crate::schemas::submission::SubmissionResponse;

#[derive(Debug, Serialize)]
pub(crate) struct AnalyticsResponse {
    pub(crate) test_id: String,
    pub(crate) total_submissions: i32,
    pub(crate) total_participants: i32,
    pub(crate) average_score: f64,
    pub(crate) pass_rate: f64,
    pub(crate) average_time_minutes: f64,
    pub(crate) last_updated: String,
}

impl From<TestAnalytics> for AnalyticsResponse {
    fn from(analytics: TestAnalytics) -> Self {
        Self {
            test_id: analytics.test_id,
            total_submissions: analytics.total_submissions,
            total_participants: analytics.total_participants,
            average_score: analytics.average_score,
            pass_rate: analytics.pass_rate,
            average_time_minutes: analytics.average_time_minutes,
            last_updated: format_primitive(analytics.last_updated),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DashboardResponse {
    pub(crate) total_tests: i64,
    pub(crate) active_tests: i64,
    pub(crate) total_submissions: i64,
    pub(crate) average_score: f64,
    pub(crate) recent_submissions: Vec<SubmissionResponse>,
}
