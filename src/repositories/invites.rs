use sqlx::PgPool;

use crate::db::models::TestInvite;
use crate::db::types::InviteStatus;

const COLUMNS: &str = "\
    id, test_id, created_by, invited_user_id, invited_email, invite_token, \
    message, status, expires_at, accepted_at, created_at";

pub(crate) struct CreateInvite<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) created_by: &'a str,
    pub(crate) invited_user_id: Option<&'a str>,
    pub(crate) invited_email: &'a str,
    pub(crate) invite_token: &'a str,
    pub(crate) message: Option<&'a str>,
    pub(crate) expires_at: Option<time::PrimitiveDateTime>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateInvite<'_>,
) -> Result<TestInvite, sqlx::Error> {
    sqlx::query_as::<_, TestInvite>(&format!(
        "INSERT INTO test_invites (
            id, test_id, created_by, invited_user_id, invited_email, invite_token,
            message, status, expires_at, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.test_id)
    .bind(params.created_by)
    .bind(params.invited_user_id)
    .bind(params.invited_email)
    .bind(params.invite_token)
    .bind(params.message)
    .bind(InviteStatus::Pending)
    .bind(params.expires_at)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<TestInvite>, sqlx::Error> {
    sqlx::query_as::<_, TestInvite>(&format!("SELECT {COLUMNS} FROM test_invites WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn find_by_token(
    pool: &PgPool,
    invite_token: &str,
) -> Result<Option<TestInvite>, sqlx::Error> {
    sqlx::query_as::<_, TestInvite>(&format!(
        "SELECT {COLUMNS} FROM test_invites WHERE invite_token = $1"
    ))
    .bind(invite_token)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_test(
    pool: &PgPool,
    test_id: &str,
) -> Result<Vec<TestInvite>, sqlx::Error> {
    sqlx::query_as::<_, TestInvite>(&format!(
        "SELECT {COLUMNS} FROM test_invites WHERE test_id = $1 ORDER BY created_at DESC"
    ))
    .bind(test_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn update_status(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    status: InviteStatus,
    accepted_at: Option<time::PrimitiveDateTime>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE test_invites SET status = $1, accepted_at = COALESCE($2, accepted_at)
         WHERE id = $3",
    )
    .bind(status)
    .bind(accepted_at)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM test_invites WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
