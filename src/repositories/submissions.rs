use sqlx::{FromRow, PgPool};

use crate::db::models::TestSubmission;

pub(crate) const COLUMNS: &str = "\
    id, test_id, user_id, participant_name, participant_email, score, \
    total_questions, correct_answers, is_passed, time_taken_minutes, \
    question_results, session_id, invite_token, submitted_at";

pub(crate) struct CreateSubmission<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) user_id: Option<&'a str>,
    pub(crate) participant_name: &'a str,
    pub(crate) participant_email: Option<&'a str>,
    pub(crate) score: f64,
    pub(crate) total_questions: i32,
    pub(crate) correct_answers: i32,
    pub(crate) is_passed: bool,
    pub(crate) time_taken_minutes: Option<i32>,
    pub(crate) question_results: serde_json::Value,
    pub(crate) session_id: Option<&'a str>,
    pub(crate) invite_token: Option<&'a str>,
    pub(crate) submitted_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateSubmission<'_>,
) -> Result<TestSubmission, sqlx::Error> {
    sqlx::query_as::<_, TestSubmission>(&format!(
        "INSERT INTO test_submissions (
            id, test_id, user_id, participant_name, participant_email, score,
            total_questions, correct_answers, is_passed, time_taken_minutes,
            question_results, session_id, invite_token, submitted_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.test_id)
    .bind(params.user_id)
    .bind(params.participant_name)
    .bind(params.participant_email)
    .bind(params.score)
    .bind(params.total_questions)
    .bind(params.correct_answers)
    .bind(params.is_passed)
    .bind(params.time_taken_minutes)
    .bind(params.question_results)
    .bind(params.session_id)
    .bind(params.invite_token)
    .bind(params.submitted_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<TestSubmission>, sqlx::Error> {
    sqlx::query_as::<_, TestSubmission>(&format!(
        "SELECT {COLUMNS} FROM test_submissions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_test(
    pool: &PgPool,
    test_id: &str,
    skip: i64,
    limit: i64,
) -> Result<Vec<TestSubmission>, sqlx::Error> {
    sqlx::query_as::<_, TestSubmission>(&format!(
        "SELECT {COLUMNS} FROM test_submissions WHERE test_id = $1
         ORDER BY submitted_at DESC OFFSET $2 LIMIT $3"
    ))
    .bind(test_id)
    .bind(skip.max(0))
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_email(
    pool: &PgPool,
    test_id: &str,
    email: &str,
) -> Result<Vec<TestSubmission>, sqlx::Error> {
    sqlx::query_as::<_, TestSubmission>(&format!(
        "SELECT {COLUMNS} FROM test_submissions
         WHERE test_id = $1 AND participant_email = $2
         ORDER BY submitted_at DESC"
    ))
    .bind(test_id)
    .bind(email)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_user(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<TestSubmission>, sqlx::Error> {
    sqlx::query_as::<_, TestSubmission>(&format!(
        "SELECT {COLUMNS} FROM test_submissions WHERE user_id = $1 ORDER BY submitted_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Submission count for one registered user on one test. Attempt limits
/// are enforced against this number alone.
pub(crate) async fn count_by_test_and_user(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    user_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM test_submissions WHERE test_id = $1 AND user_id = $2",
    )
    .bind(test_id)
    .bind(user_id)
    .fetch_one(executor)
    .await
}

const QUALIFIED_COLUMNS: &str = "\
    s.id, s.test_id, s.user_id, s.participant_name, s.participant_email, s.score, \
    s.total_questions, s.correct_answers, s.is_passed, s.time_taken_minutes, \
    s.question_results, s.session_id, s.invite_token, s.submitted_at";

/// Latest submissions across every test the owner created.
pub(crate) async fn list_recent_for_owner(
    pool: &PgPool,
    owner_id: &str,
    limit: i64,
) -> Result<Vec<TestSubmission>, sqlx::Error> {
    sqlx::query_as::<_, TestSubmission>(&format!(
        "SELECT {QUALIFIED_COLUMNS} FROM test_submissions s
         JOIN tests t ON t.id = s.test_id
         WHERE t.created_by = $1
         ORDER BY s.submitted_at DESC
         LIMIT $2"
    ))
    .bind(owner_id)
    .bind(limit.clamp(1, 100))
    .fetch_all(pool)
    .await
}

#[derive(Debug, FromRow)]
pub(crate) struct LeaderboardRow {
    pub(crate) participant_name: String,
    pub(crate) score: f64,
    pub(crate) is_passed: bool,
    pub(crate) attempts: i64,
    pub(crate) submitted_at: time::PrimitiveDateTime,
}

/// Best score per participant, ranked. Registered users are keyed by
/// user id; anonymous participants fall back to email, then row id.
pub(crate) async fn leaderboard(
    pool: &PgPool,
    test_id: &str,
    limit: i64,
) -> Result<Vec<LeaderboardRow>, sqlx::Error> {
    sqlx::query_as::<_, LeaderboardRow>(
        "SELECT participant_name, score, is_passed, attempts, submitted_at FROM (
            SELECT DISTINCT ON (COALESCE(user_id, participant_email, id))
                participant_name, score, is_passed, submitted_at,
                COUNT(*) OVER (
                    PARTITION BY COALESCE(user_id, participant_email, id)
                ) AS attempts
            FROM test_submissions
            WHERE test_id = $1
            ORDER BY COALESCE(user_id, participant_email, id), score DESC, submitted_at
         ) best
         ORDER BY score DESC, submitted_at
         LIMIT $2",
    )
    .bind(test_id)
    .bind(limit.clamp(1, 1000))
    .fetch_all(pool)
    .await
}
