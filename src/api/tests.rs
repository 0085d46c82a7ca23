use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_owned_test, CurrentUser, OptionalUser};
use crate::api::pagination::PaginatedResponse;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::repositories;
use crate::schemas::analytics::AnalyticsResponse;
use crate::schemas::submission::SubmissionResponse;
use crate::schemas::test::{
    to_primitive, AttemptStanding, LeaderboardEntry, TestCreate, TestDetailResponse, TestListItem,
    TestResponse, TestUpdate,
};
use crate::services::{access, allocation, tokens};

#[derive(Debug, Deserialize)]
pub(crate) struct ListSubmissionsQuery {
    #[serde(default)]
    skip: i64,
    #[serde(default = "crate::api::pagination::default_limit")]
    limit: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LeaderboardQuery {
    #[serde(default = "default_leaderboard_limit")]
    limit: i64,
}

fn default_leaderboard_limit() -> i64 {
    20
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_test).get(list_tests))
        .route("/:test_id", get(get_test).patch(update_test).delete(delete_test))
        .route("/:test_id/analytics", get(get_analytics))
        .route("/:test_id/submissions", get(list_submissions))
        .route("/:test_id/leaderboard", get(leaderboard))
}

async fn create_test(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<TestCreate>,
) -> Result<(StatusCode, Json<TestResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let max_questions = state.settings().quiz().max_questions_per_test;
    if u64::from(payload.num_questions.unsigned_abs()) > max_questions {
        return Err(ApiError::BadRequest(format!(
            "num_questions cannot exceed {max_questions}"
        )));
    }

    let scheduled_start = payload.scheduled_start.map(to_primitive);
    let scheduled_end = payload.scheduled_end.map(to_primitive);
    if let (Some(start), Some(end)) = (scheduled_start, scheduled_end) {
        if end <= start {
            return Err(ApiError::BadRequest(
                "scheduled_end must be after scheduled_start".to_string(),
            ));
        }
    }

    let owned = repositories::banks::count_owned_in(state.db(), &payload.question_bank_ids, &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to check question banks"))?;
    if owned != payload.question_bank_ids.len() as i64 {
        return Err(ApiError::NotFound("One or more question banks not found".to_string()));
    }

    let mut pools = Vec::with_capacity(payload.question_bank_ids.len());
    for bank_id in &payload.question_bank_ids {
        let question_ids = repositories::questions::list_ids_filtered(
            state.db(),
            bank_id,
            payload.difficulty_filter,
            payload.category_filter.as_deref(),
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load bank questions"))?;
        pools.push(allocation::BankPool { bank_id: bank_id.clone(), question_ids });
    }

    let selected = allocation::draw_questions(payload.num_questions as usize, &pools)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let bank_ids = serde_json::to_value(&payload.question_bank_ids)
        .map_err(|e| ApiError::internal(e, "Failed to encode bank ids"))?;

    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let test = repositories::tests::create(
        &mut *tx,
        repositories::tests::CreateTest {
            id: &tokens::new_id(),
            title: payload.title.trim(),
            description: payload.description.as_deref(),
            question_bank_ids: bank_ids,
            created_by: &user.id,
            num_questions: payload.num_questions,
            time_limit_minutes: payload.time_limit_minutes,
            difficulty_filter: payload.difficulty_filter,
            category_filter: payload.category_filter.as_deref(),
            is_active: true,
            is_public: payload.is_public,
            scheduled_start,
            scheduled_end,
            max_attempts: payload.max_attempts,
            pass_threshold: payload.pass_threshold,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create test"))?;

    repositories::tests::assign_questions(&mut *tx, &test.id, &selected)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to assign questions"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok((StatusCode::CREATED, Json(test.into())))
}

async fn list_tests(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<TestListItem>>, ApiError> {
    let tests = repositories::tests::list_by_owner(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list tests"))?;

    let ids: Vec<String> = tests.iter().map(|test| test.id.clone()).collect();
    let rollups = repositories::analytics::rollups_for_tests(state.db(), &ids)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load analytics"))?;
    let by_test: HashMap<String, (i32, f64)> = rollups
        .into_iter()
        .map(|rollup| (rollup.test_id, (rollup.total_submissions, rollup.average_score)))
        .collect();

    let items = tests
        .into_iter()
        .map(|test| {
            let (total_submissions, average_score) =
                by_test.get(&test.id).copied().unwrap_or((0, 0.0));
            TestListItem { test: test.into(), total_submissions, average_score }
        })
        .collect();

    Ok(Json(items))
}

async fn get_test(
    Path(test_id): Path<String>,
    OptionalUser(user): OptionalUser,
    State(state): State<AppState>,
) -> Result<Json<TestDetailResponse>, ApiError> {
    let test = repositories::tests::find_by_id(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let is_owner = user.as_ref().is_some_and(|user| user.id == test.created_by);
    if !is_owner && !test.is_public {
        return Err(ApiError::NotFound("Test not found".to_string()));
    }

    let attempt_standing = match user.as_ref().filter(|user| !user.is_guest && !is_owner) {
        Some(user) => {
            let used =
                repositories::submissions::count_by_test_and_user(state.db(), &test.id, &user.id)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
            Some(AttemptStanding {
                attempts_used: used,
                attempts_remaining: access::remaining_attempts(&test, used),
                can_submit: access::check_attempts(&test, used, false).is_ok(),
            })
        }
        None => None,
    };

    // The answer key is only shown to the test's creator.
    let questions = if is_owner {
        let questions = repositories::tests::list_questions_ordered(state.db(), &test.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;
        Some(questions.into_iter().map(Into::into).collect())
    } else {
        None
    };

    Ok(Json(TestDetailResponse { test: test.into(), attempt_standing, questions }))
}

async fn update_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<TestUpdate>,
) -> Result<Json<TestResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let test = require_owned_test(&state, &user, &test_id).await?;

    repositories::tests::update(
        state.db(),
        &test.id,
        repositories::tests::UpdateTest {
            title: payload.title,
            description: payload.description,
            time_limit_minutes: payload.time_limit_minutes,
            is_active: payload.is_active,
            is_public: payload.is_public,
            scheduled_start: payload.scheduled_start.map(to_primitive),
            scheduled_end: payload.scheduled_end.map(to_primitive),
            max_attempts: payload.max_attempts,
            pass_threshold: payload.pass_threshold,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update test"))?;

    let test = repositories::tests::find_by_id(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    Ok(Json(test.into()))
}

async fn delete_test(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let test = require_owned_test(&state, &user, &test_id).await?;

    repositories::tests::delete(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete test"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn get_analytics(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let test = require_owned_test(&state, &user, &test_id).await?;

    // Reads recompute as well, so a test with no submissions yet still
    // gets a zeroed row.
    repositories::analytics::recompute(state.db(), &test.id, primitive_now_utc())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to recompute analytics"))?;

    let analytics = repositories::analytics::find_by_test(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load analytics"))?
        .ok_or_else(|| ApiError::NotFound("Analytics not found".to_string()))?;

    Ok(Json(analytics.into()))
}

async fn list_submissions(
    Path(test_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ListSubmissionsQuery>,
) -> Result<Json<PaginatedResponse<SubmissionResponse>>, ApiError> {
    let test = require_owned_test(&state, &user, &test_id).await?;

    let skip = params.skip.max(0);
    let limit = params.limit.clamp(1, 1000);

    let submissions = repositories::submissions::list_by_test(state.db(), &test.id, skip, limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list submissions"))?;

    let analytics = repositories::analytics::find_by_test(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load analytics"))?;
    let total_count = analytics.map(|a| i64::from(a.total_submissions)).unwrap_or(0);

    let items = submissions.into_iter().map(SubmissionResponse::summary).collect();
    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

async fn leaderboard(
    Path(test_id): Path<String>,
    OptionalUser(user): OptionalUser,
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let test = repositories::tests::find_by_id(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let is_owner = user.as_ref().is_some_and(|user| user.id == test.created_by);
    if !is_owner && !test.is_public {
        return Err(ApiError::NotFound("Test not found".to_string()));
    }

    let rows = repositories::submissions::leaderboard(state.db(), &test.id, params.limit)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to build leaderboard"))?;

    let entries = rows
        .into_iter()
        .enumerate()
        .map(|(index, row)| LeaderboardEntry {
            rank: index as i64 + 1,
            participant_name: row.participant_name,
            score: row.score,
            is_passed: row.is_passed,
            attempts: row.attempts,
            submitted_at: format_primitive(row.submitted_at),
        })
        .collect();

    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::test_support::{self, TestSpec};

    #[tokio::test]
    async fn create_test_draws_questions_from_the_bank() {
        let ctx = test_support::setup_test_context().await;
        let owner =
            test_support::insert_user(ctx.state.db(), "owner@example.com", "Owner", "password-1")
                .await;
        let bank = test_support::insert_bank(ctx.state.db(), "Geography", &owner.id).await;
        for i in 0..3 {
            test_support::insert_question(
                ctx.state.db(),
                &bank.id,
                &format!("Question {i}?"),
                "Answer",
            )
            .await;
        }
        let token = test_support::bearer_token(&owner.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/tests",
                Some(&token),
                Some(json!({
                    "title": "Geography quiz",
                    "question_bank_ids": [bank.id],
                    "num_questions": 2,
                    "is_public": true
                })),
            ))
            .await
            .expect("create test");
        let status = response.status();
        let created = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {created}");
        let test_id = created["id"].as_str().expect("test id").to_string();

        let assigned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM test_questions WHERE test_id = $1")
                .bind(&test_id)
                .fetch_one(ctx.state.db())
                .await
                .expect("count assigned");
        assert_eq!(assigned, 2);
    }

    #[tokio::test]
    async fn create_test_rejects_a_short_question_pool() {
        let ctx = test_support::setup_test_context().await;
        let owner =
            test_support::insert_user(ctx.state.db(), "owner@example.com", "Owner", "password-1")
                .await;
        let bank = test_support::insert_bank(ctx.state.db(), "Geography", &owner.id).await;
        test_support::insert_question(ctx.state.db(), &bank.id, "Only question?", "Answer").await;
        let token = test_support::bearer_token(&owner.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/tests",
                Some(&token),
                Some(json!({
                    "title": "Too big",
                    "question_bank_ids": [bank.id],
                    "num_questions": 5,
                    "is_public": true
                })),
            ))
            .await
            .expect("create test");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
    }

    #[tokio::test]
    async fn leaderboard_keeps_the_best_score_per_participant() {
        let ctx = test_support::setup_test_context().await;
        let owner =
            test_support::insert_user(ctx.state.db(), "owner@example.com", "Owner", "password-1")
                .await;
        let bank = test_support::insert_bank(ctx.state.db(), "Geography", &owner.id).await;
        test_support::insert_question(ctx.state.db(), &bank.id, "Q?", "A").await;
        let test =
            test_support::insert_test(ctx.state.db(), &owner.id, &bank, TestSpec::default()).await;

        let db = ctx.state.db();
        test_support::insert_submission(db, &test.id, "Alice", Some("alice@example.com"), 40.0, false)
            .await;
        test_support::insert_submission(db, &test.id, "Alice", Some("alice@example.com"), 90.0, true)
            .await;
        test_support::insert_submission(db, &test.id, "Bob", Some("bob@example.com"), 70.0, true)
            .await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/tests/{}/leaderboard", test.id),
                None,
                None,
            ))
            .await
            .expect("leaderboard");
        let board = test_support::read_json(response).await;
        let entries = board.as_array().expect("entries");
        assert_eq!(entries.len(), 2, "response: {board}");
        assert_eq!(entries[0]["participant_name"], "Alice");
        assert_eq!(entries[0]["score"], 90.0);
        assert_eq!(entries[0]["rank"], 1);
        assert_eq!(entries[0]["attempts"], 2);
        assert_eq!(entries[1]["participant_name"], "Bob");
        assert_eq!(entries[1]["score"], 70.0);
        assert_eq!(entries[1]["attempts"], 1);
    }

    #[tokio::test]
    async fn analytics_recompute_covers_every_submission() {
        let ctx = test_support::setup_test_context().await;
        let owner =
            test_support::insert_user(ctx.state.db(), "owner@example.com", "Owner", "password-1")
                .await;
        let bank = test_support::insert_bank(ctx.state.db(), "Geography", &owner.id).await;
        test_support::insert_question(ctx.state.db(), &bank.id, "Q?", "A").await;
        let test =
            test_support::insert_test(ctx.state.db(), &owner.id, &bank, TestSpec::default()).await;
        let token = test_support::bearer_token(&owner.id, ctx.state.settings());

        let db = ctx.state.db();
        test_support::insert_submission(db, &test.id, "Alice", Some("alice@example.com"), 80.0, true)
            .await;
        test_support::insert_submission(db, &test.id, "Bob", Some("bob@example.com"), 60.0, true)
            .await;
        test_support::insert_submission(db, &test.id, "Carol", Some("carol@example.com"), 40.0, false)
            .await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/tests/{}/analytics", test.id),
                Some(&token),
                None,
            ))
            .await
            .expect("analytics");
        let status = response.status();
        let analytics = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {analytics}");
        assert_eq!(analytics["total_submissions"], 3);
        assert_eq!(analytics["total_participants"], 3);
        assert_eq!(analytics["average_score"], 60.0);
        let pass_rate = analytics["pass_rate"].as_f64().expect("pass rate");
        assert!((pass_rate - 200.0 / 3.0).abs() < 0.01, "response: {analytics}");
    }

    #[tokio::test]
    async fn private_tests_hide_from_other_users() {
        let ctx = test_support::setup_test_context().await;
        let owner =
            test_support::insert_user(ctx.state.db(), "owner@example.com", "Owner", "password-1")
                .await;
        let other =
            test_support::insert_user(ctx.state.db(), "other@example.com", "Other", "password-2")
                .await;
        let bank = test_support::insert_bank(ctx.state.db(), "Geography", &owner.id).await;
        test_support::insert_question(ctx.state.db(), &bank.id, "Q?", "A").await;
        let test = test_support::insert_test(
            ctx.state.db(),
            &owner.id,
            &bank,
            TestSpec { is_public: false, ..TestSpec::default() },
        )
        .await;
        let other_token = test_support::bearer_token(&other.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/tests/{}", test.id),
                Some(&other_token),
                None,
            ))
            .await
            .expect("get test");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
