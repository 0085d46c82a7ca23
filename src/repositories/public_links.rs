use sqlx::PgPool;

use crate::db::models::TestPublicLink;

const COLUMNS: &str = "\
    id, test_id, created_by, link_token, is_active, max_uses, current_uses, \
    expires_at, created_at";

pub(crate) struct CreateLink<'a> {
    pub(crate) id: &'a str,
    pub(crate) test_id: &'a str,
    pub(crate) created_by: &'a str,
    pub(crate) link_token: &'a str,
    pub(crate) max_uses: Option<i32>,
    pub(crate) expires_at: Option<time::PrimitiveDateTime>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateLink<'_>,
) -> Result<TestPublicLink, sqlx::Error> {
    sqlx::query_as::<_, TestPublicLink>(&format!(
        "INSERT INTO test_public_links (
            id, test_id, created_by, link_token, is_active, max_uses, current_uses,
            expires_at, created_at
        ) VALUES ($1,$2,$3,$4,TRUE,$5,0,$6,$7)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.test_id)
    .bind(params.created_by)
    .bind(params.link_token)
    .bind(params.max_uses)
    .bind(params.expires_at)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<TestPublicLink>, sqlx::Error> {
    sqlx::query_as::<_, TestPublicLink>(&format!(
        "SELECT {COLUMNS} FROM test_public_links WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_by_token(
    pool: &PgPool,
    link_token: &str,
) -> Result<Option<TestPublicLink>, sqlx::Error> {
    sqlx::query_as::<_, TestPublicLink>(&format!(
        "SELECT {COLUMNS} FROM test_public_links WHERE link_token = $1"
    ))
    .bind(link_token)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_test(
    pool: &PgPool,
    test_id: &str,
) -> Result<Vec<TestPublicLink>, sqlx::Error> {
    sqlx::query_as::<_, TestPublicLink>(&format!(
        "SELECT {COLUMNS} FROM test_public_links WHERE test_id = $1 ORDER BY created_at DESC"
    ))
    .bind(test_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn deactivate(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE test_public_links SET is_active = FALSE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Take one use of the link. The guard repeats the validity checks so a
/// concurrent taker cannot push the counter past max_uses.
pub(crate) async fn consume_use(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    now: time::PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE test_public_links SET current_uses = current_uses + 1
         WHERE id = $1 AND is_active
           AND (expires_at IS NULL OR expires_at > $2)
           AND (max_uses IS NULL OR current_uses < max_uses)",
    )
    .bind(id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn log_usage(
    executor: impl sqlx::PgExecutor<'_>,
    link_id: &str,
    participant_name: &str,
    participant_email: Option<&str>,
    used_at: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO test_link_usage (link_id, participant_name, participant_email, used_at)
         VALUES ($1,$2,$3,$4)",
    )
    .bind(link_id)
    .bind(participant_name)
    .bind(participant_email)
    .bind(used_at)
    .execute(executor)
    .await?;
    Ok(())
}
