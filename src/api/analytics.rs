use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::analytics::DashboardResponse;
use crate::schemas::submission::SubmissionResponse;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/dashboard", get(dashboard))
}

async fn dashboard(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let totals = repositories::analytics::dashboard_totals(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load dashboard totals"))?;

    let recent = repositories::submissions::list_recent_for_owner(state.db(), &user.id, 10)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load recent submissions"))?;

    Ok(Json(DashboardResponse {
        total_tests: totals.total_tests,
        active_tests: totals.active_tests,
        total_submissions: totals.total_submissions,
        average_score: totals.average_score,
        recent_submissions: recent.into_iter().map(SubmissionResponse::summary).collect(),
    }))
}
