use sqlx::PgPool;

use crate::db::models::TestSession;
use crate::db::types::SessionStatus;

pub(crate) const COLUMNS: &str = "\
    id, test_id, user_id, participant_name, participant_email, session_token, \
    invite_token, status, current_question, answers_draft, started_at, expires_at, \
    submission_id, created_at, updated_at";

pub(crate) struct CreateSession<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) user_id: Option<&'a str>,
    pub(crate) participant_name: &'a str,
    pub(crate) participant_email: Option<&'a str>,
    pub(crate) session_token: &'a str,
    pub(crate) invite_token: Option<&'a str>,
    pub(crate) status: SessionStatus,
    pub(crate) answers_draft: serde_json::Value,
    pub(crate) started_at: time::PrimitiveDateTime,
    pub(crate) expires_at: time::PrimitiveDateTime,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    session: CreateSession<'_>,
) -> Result<TestSession, sqlx::Error> {
    sqlx::query_as::<_, TestSession>(&format!(
        "INSERT INTO test_sessions (
            id, test_id, user_id, participant_name, participant_email, session_token,
            invite_token, status, current_question, answers_draft, started_at, expires_at,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,1,$9,$10,$11,$12,$13)
        RETURNING {COLUMNS}",
    ))
    .bind(session.id)
    .bind(session.test_id)
    .bind(session.user_id)
    .bind(session.participant_name)
    .bind(session.participant_email)
    .bind(session.session_token)
    .bind(session.invite_token)
    .bind(session.status)
    .bind(session.answers_draft)
    .bind(session.started_at)
    .bind(session.expires_at)
    .bind(session.created_at)
    .bind(session.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<TestSession>, sqlx::Error> {
    sqlx::query_as::<_, TestSession>(&format!(
        "SELECT {COLUMNS} FROM test_sessions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_token(
    pool: &PgPool,
    session_token: &str,
) -> Result<Option<TestSession>, sqlx::Error> {
    sqlx::query_as::<_, TestSession>(&format!(
        "SELECT {COLUMNS} FROM test_sessions WHERE session_token = $1"
    ))
    .bind(session_token)
    .fetch_optional(pool)
    .await
}

/// Running session for a known user on a test, if any. Overdue rows do
/// not count; the read paths flip them to expired lazily.
pub(crate) async fn find_active_for_user(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    user_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<Option<TestSession>, sqlx::Error> {
    sqlx::query_as::<_, TestSession>(&format!(
        "SELECT {COLUMNS} FROM test_sessions \
         WHERE test_id = $1 AND user_id = $2 AND status = $3 AND expires_at > $4"
    ))
    .bind(test_id)
    .bind(user_id)
    .bind(SessionStatus::Active)
    .bind(now)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn update_draft(
    pool: &PgPool,
    id: &str,
    answers_draft: serde_json::Value,
    current_question: i32,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE test_sessions SET answers_draft = $1, current_question = $2, updated_at = $3
         WHERE id = $4",
    )
    .bind(answers_draft)
    .bind(current_question)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Move an active session into a terminal state. Returns false when the
/// session was no longer active, which is how concurrent submits lose
/// the race.
pub(crate) async fn claim_transition(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    to: SessionStatus,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE test_sessions SET status = $1, updated_at = $2
         WHERE id = $3 AND status = $4",
    )
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(SessionStatus::Active)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn attach_submission(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    submission_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE test_sessions SET submission_id = $1, updated_at = $2 WHERE id = $3")
        .bind(submission_id)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}
