use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use time::Duration;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentUser, OptionalUser};
use crate::core::state::AppState;
use crate::core::time::{format_primitive, minutes_between, primitive_now_utc};
use crate::db::models::{AnswerDraft, Test, TestSession};
use crate::db::types::{InviteStatus, SessionStatus};
use crate::repositories;
use crate::schemas::session::{
    QuestionPublic, SaveAnswer, SessionQuestionsResponse, SessionResponse, SessionStart,
    SessionStatusResponse,
};
use crate::schemas::submission::SubmissionResponse;
use crate::services::{access, participants, scoring, tokens};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/tests/:test_id/start", post(start_session))
        .route("/tests/:test_id/results", get(results_by_email))
        .route("/sessions/:session_token/questions", get(session_questions))
        .route("/sessions/:session_token/status", get(session_status))
        .route("/sessions/:session_token/answers", post(save_answer))
        .route("/sessions/:session_token/submit", post(submit_session))
        .route("/sessions/:session_token/cancel", post(cancel_session))
        .route("/submissions/:submission_id", get(get_submission))
        .route("/my/attempts", get(my_attempts))
}

fn map_access(denied: access::AccessDenied) -> ApiError {
    match denied {
        access::AccessDenied::Inactive => ApiError::Forbidden("Test is not active"),
        access::AccessDenied::NotYetOpen => ApiError::Forbidden("Test has not started yet"),
        access::AccessDenied::Closed => ApiError::Forbidden("Test has already closed"),
        access::AccessDenied::AttemptLimit { .. } => {
            ApiError::Conflict(denied.to_string())
        }
    }
}

/// Loads a session by its opaque token, flipping it to expired first
/// when its deadline has passed.
async fn load_session(state: &AppState, session_token: &str) -> Result<TestSession, ApiError> {
    let session = repositories::sessions::find_by_token(state.db(), session_token)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load session"))?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    let now = primitive_now_utc();
    if session.status == SessionStatus::Active && session.expires_at <= now {
        repositories::sessions::claim_transition(state.db(), &session.id, SessionStatus::Expired, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to expire session"))?;
        let session = repositories::sessions::find_by_id(state.db(), &session.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to reload session"))?
            .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
        return Ok(session);
    }

    Ok(session)
}

fn require_active(session: &TestSession) -> Result<(), ApiError> {
    match session.status {
        SessionStatus::Active => Ok(()),
        SessionStatus::Submitted => Err(ApiError::Conflict("Session already submitted".to_string())),
        SessionStatus::Expired => Err(ApiError::Conflict("Session has expired".to_string())),
        SessionStatus::Cancelled => Err(ApiError::Conflict("Session was cancelled".to_string())),
    }
}

enum ShareToken {
    None,
    Invite(crate::db::models::TestInvite),
    Link(crate::db::models::TestPublicLink),
}

async fn validate_share_token(
    state: &AppState,
    test: &Test,
    payload: &SessionStart,
) -> Result<ShareToken, ApiError> {
    let now = primitive_now_utc();

    if let Some(invite_token) = payload.invite_token.as_deref() {
        let invite = repositories::invites::find_by_token(state.db(), invite_token)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load invite"))?
            .filter(|invite| invite.test_id == test.id)
            .ok_or(ApiError::Forbidden("Invalid invite token"))?;

        if invite.status != InviteStatus::Pending {
            return Err(ApiError::Forbidden("Invite is no longer valid"));
        }
        if let Some(expires_at) = invite.expires_at {
            if expires_at <= now {
                repositories::invites::update_status(
                    state.db(),
                    &invite.id,
                    InviteStatus::Expired,
                    None,
                )
                .await
                .map_err(|e| ApiError::internal(e, "Failed to expire invite"))?;
                return Err(ApiError::Forbidden("Invite has expired"));
            }
        }
        return Ok(ShareToken::Invite(invite));
    }

    if let Some(link_token) = payload.link_token.as_deref() {
        let link = repositories::public_links::find_by_token(state.db(), link_token)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load link"))?
            .filter(|link| link.test_id == test.id)
            .ok_or(ApiError::Forbidden("Invalid link token"))?;
        return Ok(ShareToken::Link(link));
    }

    Ok(ShareToken::None)
}

async fn start_session(
    Path(test_id): Path<String>,
    OptionalUser(user): OptionalUser,
    State(state): State<AppState>,
    Json(payload): Json<SessionStart>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let test = repositories::tests::find_by_id(state.db(), &test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let now = primitive_now_utc();
    access::check_open(&test, now).map_err(map_access)?;

    let share_token = validate_share_token(&state, &test, &payload).await?;
    let is_owner = user.as_ref().is_some_and(|user| user.id == test.created_by);
    if matches!(share_token, ShareToken::None) && !test.is_public && !is_owner {
        return Err(ApiError::Forbidden("This test requires an invitation"));
    }

    let participant = participants::resolve(
        state.db(),
        user.as_ref(),
        payload.participant_name.trim(),
        payload.participant_email.as_deref(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to resolve participant"))?;

    // Starting twice returns the running session instead of forking a
    // second one.
    if let Some(user_id) = participant.user_id.as_deref() {
        let existing =
            repositories::sessions::find_active_for_user(state.db(), &test.id, user_id, now)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to check existing session"))?;
        if let Some(existing) = existing {
            return Ok((StatusCode::OK, Json(existing.into())));
        }

        if !participant.is_guest {
            let used =
                repositories::submissions::count_by_test_and_user(state.db(), &test.id, user_id)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
            access::check_attempts(&test, used, participant.is_guest).map_err(map_access)?;
        }
    }

    if let ShareToken::Link(link) = &share_token {
        let consumed = repositories::public_links::consume_use(state.db(), &link.id, now)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to consume link use"))?;
        if !consumed {
            return Err(ApiError::Forbidden("This link is no longer valid"));
        }
        repositories::public_links::log_usage(
            state.db(),
            &link.id,
            &participant.name,
            participant.email.as_deref(),
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to log link usage"))?;
    }

    let expires_at = match test.time_limit_minutes {
        Some(minutes) => now + Duration::minutes(i64::from(minutes)),
        None => {
            let hours = state.settings().quiz().default_session_hours;
            now + Duration::hours(hours as i64)
        }
    };

    let invite_token = match &share_token {
        ShareToken::Invite(invite) => Some(invite.invite_token.clone()),
        _ => None,
    };

    let session = repositories::sessions::create(
        state.db(),
        repositories::sessions::CreateSession {
            id: &tokens::new_id(),
            test_id: &test.id,
            user_id: participant.user_id.as_deref(),
            participant_name: &participant.name,
            participant_email: participant.email.as_deref(),
            session_token: &tokens::generate_token(),
            invite_token: invite_token.as_deref(),
            status: SessionStatus::Active,
            answers_draft: serde_json::json!({}),
            started_at: now,
            expires_at,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create session"))?;

    if let ShareToken::Invite(invite) = &share_token {
        repositories::invites::update_status(
            state.db(),
            &invite.id,
            InviteStatus::Accepted,
            Some(now),
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to accept invite"))?;
    }

    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn session_questions(
    Path(session_token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionQuestionsResponse>, ApiError> {
    let session = load_session(&state, &session_token).await?;
    require_active(&session)?;

    let test = repositories::tests::find_by_id(state.db(), &session.test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let questions = repositories::tests::list_questions_ordered(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;

    let questions = questions
        .into_iter()
        .enumerate()
        .map(|(index, question)| QuestionPublic {
            id: question.id,
            question_number: index as i32 + 1,
            question_text: question.question_text,
            question_type: question.question_type,
            options: question.options.0,
        })
        .collect();

    Ok(Json(SessionQuestionsResponse {
        test_id: test.id,
        title: test.title,
        time_limit_minutes: test.time_limit_minutes,
        questions,
    }))
}

async fn session_status(
    Path(session_token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let session = load_session(&state, &session_token).await?;

    let total_questions = repositories::tests::count_questions(state.db(), &session.test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    let now = primitive_now_utc();
    let remaining = (session.expires_at.assume_utc().unix_timestamp()
        - now.assume_utc().unix_timestamp())
    .max(0);
    let remaining = if session.status == SessionStatus::Active { remaining } else { 0 };

    let answered_count = session.answers_draft.0.len();
    Ok(Json(SessionStatusResponse {
        status: session.status,
        current_question: session.current_question,
        answered_count,
        can_submit: answered_count as i64 >= total_questions,
        time_remaining_seconds: remaining,
        expires_at: format_primitive(session.expires_at),
    }))
}

async fn save_answer(
    Path(session_token): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<SaveAnswer>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut session = load_session(&state, &session_token).await?;
    require_active(&session)?;

    let interval = state.settings().quiz().save_answer_interval_seconds;
    let allowed = state
        .redis()
        .rate_limit(&format!("save-answer:{}", session.id), 1, interval)
        .await
        .unwrap_or(true);
    if !allowed {
        return Err(ApiError::TooManyRequests("Saving answers too fast"));
    }

    // Only questions actually assigned to this test can enter the
    // draft map.
    let assigned = repositories::tests::is_question_assigned(
        state.db(),
        &session.test_id,
        &payload.question_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to check question"))?;
    if !assigned {
        return Err(ApiError::BadRequest(
            "Question does not belong to this test".to_string(),
        ));
    }

    let now = primitive_now_utc();
    session.answers_draft.0.insert(
        payload.question_id,
        AnswerDraft {
            selected_answer: payload.selected_answer,
            question_number: payload.question_number,
            saved_at: format_primitive(now),
        },
    );

    let draft = serde_json::to_value(&session.answers_draft.0)
        .map_err(|e| ApiError::internal(e, "Failed to encode draft"))?;
    repositories::sessions::update_draft(
        state.db(),
        &session.id,
        draft,
        payload.question_number,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to save answer"))?;

    let total_questions = repositories::tests::count_questions(state.db(), &session.test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;

    let remaining = (session.expires_at.assume_utc().unix_timestamp()
        - now.assume_utc().unix_timestamp())
    .max(0);

    let answered_count = session.answers_draft.0.len();
    Ok(Json(SessionStatusResponse {
        status: session.status,
        current_question: payload.question_number,
        answered_count,
        can_submit: answered_count as i64 >= total_questions,
        time_remaining_seconds: remaining,
        expires_at: format_primitive(session.expires_at),
    }))
}

async fn submit_session(
    Path(session_token): Path<String>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SubmissionResponse>), ApiError> {
    let session = load_session(&state, &session_token).await?;

    // A session already submitted answers with its recorded result, so
    // double submits are idempotent rather than an error.
    if session.status == SessionStatus::Submitted {
        if let Some(submission_id) = session.submission_id.as_deref() {
            let submission = repositories::submissions::find_by_id(state.db(), submission_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
                .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;
            return Ok((StatusCode::OK, Json(SubmissionResponse::detailed(submission))));
        }
    }
    require_active(&session)?;

    if session.answers_draft.0.is_empty() {
        return Err(ApiError::BadRequest("No answers found to submit".to_string()));
    }

    let test = repositories::tests::find_by_id(state.db(), &session.test_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load test"))?
        .ok_or_else(|| ApiError::NotFound("Test not found".to_string()))?;

    let now = primitive_now_utc();
    let claimed = repositories::sessions::claim_transition(
        state.db(),
        &session.id,
        SessionStatus::Submitted,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to claim session"))?;

    if !claimed {
        // Lost the race: another submit won, return its result.
        let session = repositories::sessions::find_by_id(state.db(), &session.id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to reload session"))?
            .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
        let Some(submission_id) = session.submission_id.as_deref() else {
            return Err(ApiError::Conflict("Session is no longer active".to_string()));
        };
        let submission = repositories::submissions::find_by_id(state.db(), submission_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
            .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;
        return Ok((StatusCode::OK, Json(SubmissionResponse::detailed(submission))));
    }

    let questions = repositories::tests::list_questions_ordered(state.db(), &test.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load questions"))?;

    let outcome = scoring::grade(&questions, &session.answers_draft.0, test.pass_threshold);
    let question_results = serde_json::to_value(&outcome.question_results)
        .map_err(|e| ApiError::internal(e, "Failed to encode results"))?;
    let time_taken = i32::try_from(minutes_between(session.started_at, now)).unwrap_or(i32::MAX);

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let submission = repositories::submissions::create(
        &mut *tx,
        repositories::submissions::CreateSubmission {
            id: &tokens::new_id(),
            test_id: &test.id,
            user_id: session.user_id.as_deref(),
            participant_name: &session.participant_name,
            participant_email: session.participant_email.as_deref(),
            score: outcome.score,
            total_questions: outcome.total_questions,
            correct_answers: outcome.correct_answers,
            is_passed: outcome.is_passed,
            time_taken_minutes: Some(time_taken),
            question_results,
            session_id: Some(&session.id),
            invite_token: session.invite_token.as_deref(),
            submitted_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create submission"))?;

    repositories::sessions::attach_submission(&mut *tx, &session.id, &submission.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to attach submission"))?;

    repositories::analytics::recompute(&mut *tx, &test.id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to recompute analytics"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    metrics::counter!("test_submissions_total").increment(1);

    Ok((StatusCode::CREATED, Json(SubmissionResponse::detailed(submission))))
}

async fn cancel_session(
    Path(session_token): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = load_session(&state, &session_token).await?;
    require_active(&session)?;

    let now = primitive_now_utc();
    let claimed = repositories::sessions::claim_transition(
        state.db(),
        &session.id,
        SessionStatus::Cancelled,
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to cancel session"))?;
    if !claimed {
        return Err(ApiError::Conflict("Session is no longer active".to_string()));
    }

    let session = repositories::sessions::find_by_id(state.db(), &session.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to reload session"))?
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;

    Ok(Json(session.into()))
}

async fn get_submission(
    Path(submission_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<SubmissionResponse>, ApiError> {
    let submission = repositories::submissions::find_by_id(state.db(), &submission_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load submission"))?
        .ok_or_else(|| ApiError::NotFound("Submission not found".to_string()))?;

    Ok(Json(SubmissionResponse::detailed(submission)))
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultsQuery {
    email: String,
}

async fn results_by_email(
    Path(test_id): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<ResultsQuery>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let email = params.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ApiError::BadRequest("email must not be empty".to_string()));
    }

    let submissions = repositories::submissions::list_by_email(state.db(), &test_id, &email)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list results"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::summary).collect()))
}

async fn my_attempts(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<SubmissionResponse>>, ApiError> {
    let submissions = repositories::submissions::list_by_user(state.db(), &user.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    Ok(Json(submissions.into_iter().map(SubmissionResponse::summary).collect()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::core::time::primitive_now_utc;
    use crate::test_support::{self, TestSpec};

    async fn seeded_test(
        ctx: &test_support::TestContext,
        spec: TestSpec<'_>,
    ) -> (crate::db::models::User, crate::db::models::Test) {
        let owner =
            test_support::insert_user(ctx.state.db(), "owner@example.com", "Owner", "password-1")
                .await;
        let bank = test_support::insert_bank(ctx.state.db(), "Geography", &owner.id).await;
        test_support::insert_question(ctx.state.db(), &bank.id, "Capital of France?", "Paris")
            .await;
        test_support::insert_question(ctx.state.db(), &bank.id, "Capital of Japan?", "Tokyo")
            .await;
        let test = test_support::insert_test(ctx.state.db(), &owner.id, &bank, spec).await;
        (owner, test)
    }

    async fn start_guest_session(
        ctx: &test_support::TestContext,
        test_id: &str,
        email: &str,
    ) -> (StatusCode, serde_json::Value) {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/tests/{test_id}/start"),
                None,
                Some(json!({"participant_name": "Alice", "participant_email": email})),
            ))
            .await
            .expect("start session");
        let status = response.status();
        let body = test_support::read_json(response).await;
        (status, body)
    }

    async fn save_first_answer(ctx: &test_support::TestContext, session_token: &str) {
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/taking/sessions/{session_token}/questions"),
                None,
                None,
            ))
            .await
            .expect("questions");
        let questions = test_support::read_json(response).await;
        let first = &questions["questions"].as_array().expect("questions array")[0];

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{session_token}/answers"),
                None,
                Some(json!({
                    "question_id": first["id"],
                    "selected_answer": "whatever",
                    "question_number": 1,
                })),
            ))
            .await
            .expect("save answer");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn guest_takes_a_test_end_to_end() {
        let ctx = test_support::setup_test_context().await;
        let (_, test) = seeded_test(&ctx, TestSpec::default()).await;

        let (status, session) = start_guest_session(&ctx, &test.id, "alice@example.com").await;
        assert_eq!(status, StatusCode::CREATED, "response: {session}");
        assert_eq!(session["answered_count"], 0);
        let token = session["session_token"].as_str().expect("session token").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/taking/sessions/{token}/questions"),
                None,
                None,
            ))
            .await
            .expect("questions");
        let questions = test_support::read_json(response).await;
        let listed = questions["questions"].as_array().expect("questions array");
        assert_eq!(listed.len(), 2);
        // The answer key stays server side.
        assert!(listed[0].get("correct_answer").is_none(), "response: {questions}");

        for question in listed {
            let answer = match question["question_text"].as_str() {
                Some("Capital of France?") => " paris ",
                _ => "Tokyo",
            };
            let response = ctx
                .app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    &format!("/api/v1/taking/sessions/{token}/answers"),
                    None,
                    Some(json!({
                        "question_id": question["id"],
                        "selected_answer": answer,
                        "question_number": question["question_number"],
                    })),
                ))
                .await
                .expect("save answer");
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{token}/submit"),
                None,
                None,
            ))
            .await
            .expect("submit");
        let status = response.status();
        let submission = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {submission}");
        assert_eq!(submission["score"], 100.0);
        assert_eq!(submission["correct_answers"], 2);
        assert_eq!(submission["is_passed"], true);
        assert_eq!(submission["question_results"].as_array().map(Vec::len), Some(2));

        // A second submit returns the recorded result instead of failing.
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{token}/submit"),
                None,
                None,
            ))
            .await
            .expect("second submit");
        let status = response.status();
        let repeated = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::OK, "response: {repeated}");
        assert_eq!(repeated["id"], submission["id"]);
    }

    #[tokio::test]
    async fn starting_twice_returns_the_running_session() {
        let ctx = test_support::setup_test_context().await;
        let (_, test) = seeded_test(&ctx, TestSpec::default()).await;

        let (status, first) = start_guest_session(&ctx, &test.id, "bob@example.com").await;
        assert_eq!(status, StatusCode::CREATED, "response: {first}");

        let (status, second) = start_guest_session(&ctx, &test.id, "bob@example.com").await;
        assert_eq!(status, StatusCode::OK, "response: {second}");
        assert_eq!(second["id"], first["id"]);
    }

    #[tokio::test]
    async fn attempt_limit_blocks_registered_users() {
        let ctx = test_support::setup_test_context().await;
        let (_, test) = seeded_test(&ctx, TestSpec { max_attempts: 1, ..TestSpec::default() }).await;
        let taker =
            test_support::insert_user(ctx.state.db(), "taker@example.com", "Taker", "password-2")
                .await;
        let token = test_support::bearer_token(&taker.id, ctx.state.settings());

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/tests/{}/start", test.id),
                Some(&token),
                Some(json!({"participant_name": "Taker"})),
            ))
            .await
            .expect("start");
        let status = response.status();
        let session = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "response: {session}");
        let session_token = session["session_token"].as_str().expect("token").to_string();

        save_first_answer(&ctx, &session_token).await;
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{session_token}/submit"),
                None,
                None,
            ))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/tests/{}/start", test.id),
                Some(&token),
                Some(json!({"participant_name": "Taker"})),
            ))
            .await
            .expect("start again");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn answers_must_belong_to_the_test() {
        let ctx = test_support::setup_test_context().await;
        let (owner, test) = seeded_test(&ctx, TestSpec::default()).await;
        let other_bank = test_support::insert_bank(ctx.state.db(), "History", &owner.id).await;
        let stray =
            test_support::insert_question(ctx.state.db(), &other_bank.id, "First Roman emperor?", "Augustus")
                .await;

        let (status, session) = start_guest_session(&ctx, &test.id, "carol@example.com").await;
        assert_eq!(status, StatusCode::CREATED, "response: {session}");
        let token = session["session_token"].as_str().expect("token");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{token}/answers"),
                None,
                Some(json!({
                    "question_id": stray.id,
                    "selected_answer": "Augustus",
                    "question_number": 1,
                })),
            ))
            .await
            .expect("save answer");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn overdue_sessions_expire_on_next_touch() {
        let ctx = test_support::setup_test_context().await;
        let (_, test) = seeded_test(&ctx, TestSpec::default()).await;

        let (status, session) = start_guest_session(&ctx, &test.id, "dave@example.com").await;
        assert_eq!(status, StatusCode::CREATED, "response: {session}");
        let token = session["session_token"].as_str().expect("token").to_string();

        let past = primitive_now_utc() - time::Duration::hours(1);
        sqlx::query("UPDATE test_sessions SET expires_at = $1 WHERE session_token = $2")
            .bind(past)
            .bind(&token)
            .execute(ctx.state.db())
            .await
            .expect("backdate session");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/taking/sessions/{token}/status"),
                None,
                None,
            ))
            .await
            .expect("status");
        let body = test_support::read_json(response).await;
        assert_eq!(body["status"], "expired", "response: {body}");
        assert_eq!(body["time_remaining_seconds"], 0);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{token}/submit"),
                None,
                None,
            ))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn submitting_an_empty_draft_is_rejected() {
        let ctx = test_support::setup_test_context().await;
        let (_, test) = seeded_test(&ctx, TestSpec::default()).await;

        let (status, session) = start_guest_session(&ctx, &test.id, "frank@example.com").await;
        assert_eq!(status, StatusCode::CREATED, "response: {session}");
        let token = session["session_token"].as_str().expect("token").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{token}/submit"),
                None,
                None,
            ))
            .await
            .expect("submit");
        let status = response.status();
        let body = test_support::read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");
        assert_eq!(body["detail"], "No answers found to submit");

        // The session stays active, so answers can still be saved.
        save_first_answer(&ctx, &token).await;
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{token}/submit"),
                None,
                None,
            ))
            .await
            .expect("submit with answer");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // can_submit compares counts only; it never checks which question
    // ids are in the draft.
    #[tokio::test]
    async fn status_reports_can_submit_from_answer_counts() {
        let ctx = test_support::setup_test_context().await;
        let (_, test) = seeded_test(&ctx, TestSpec::default()).await;

        let (status, session) = start_guest_session(&ctx, &test.id, "grace@example.com").await;
        assert_eq!(status, StatusCode::CREATED, "response: {session}");
        let token = session["session_token"].as_str().expect("token").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/taking/sessions/{token}/questions"),
                None,
                None,
            ))
            .await
            .expect("questions");
        let questions = test_support::read_json(response).await;
        let listed = questions["questions"].as_array().expect("questions array");
        assert_eq!(listed.len(), 2);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/taking/sessions/{token}/status"),
                None,
                None,
            ))
            .await
            .expect("status");
        let body = test_support::read_json(response).await;
        assert_eq!(body["answered_count"], 0, "response: {body}");
        assert_eq!(body["can_submit"], false);

        for (index, question) in listed.iter().enumerate() {
            let response = ctx
                .app
                .clone()
                .oneshot(test_support::json_request(
                    Method::POST,
                    &format!("/api/v1/taking/sessions/{token}/answers"),
                    None,
                    Some(json!({
                        "question_id": question["id"],
                        "selected_answer": "guess",
                        "question_number": index as i64 + 1,
                    })),
                ))
                .await
                .expect("save answer");
            let saved = test_support::read_json(response).await;
            let expected = index + 1 >= listed.len();
            assert_eq!(saved["can_submit"], expected, "response: {saved}");
        }

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::GET,
                &format!("/api/v1/taking/sessions/{token}/status"),
                None,
                None,
            ))
            .await
            .expect("status");
        let body = test_support::read_json(response).await;
        assert_eq!(body["answered_count"], 2, "response: {body}");
        assert_eq!(body["can_submit"], true);
    }

    #[tokio::test]
    async fn cancelled_sessions_cannot_be_submitted() {
        let ctx = test_support::setup_test_context().await;
        let (_, test) = seeded_test(&ctx, TestSpec::default()).await;

        let (status, session) = start_guest_session(&ctx, &test.id, "erin@example.com").await;
        assert_eq!(status, StatusCode::CREATED, "response: {session}");
        let token = session["session_token"].as_str().expect("token").to_string();

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{token}/cancel"),
                None,
                None,
            ))
            .await
            .expect("cancel");
        let body = test_support::read_json(response).await;
        assert_eq!(body["status"], "cancelled", "response: {body}");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                &format!("/api/v1/taking/sessions/{token}/submit"),
                None,
                None,
            ))
            .await
            .expect("submit");
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
