use sqlx::PgPool;

use crate::db::models::QuestionBank;

const COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<QuestionBank>, sqlx::Error> {
    sqlx::query_as::<_, QuestionBank>(&format!(
        "SELECT {COLUMNS} FROM question_banks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn list_by_owner(
    pool: &PgPool,
    owner_id: &str,
) -> Result<Vec<QuestionBank>, sqlx::Error> {
    sqlx::query_as::<_, QuestionBank>(&format!(
        "SELECT {COLUMNS} FROM question_banks WHERE created_by = $1 ORDER BY created_at DESC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn find_owned(
    pool: &PgPool,
    id: &str,
    owner_id: &str,
) -> Result<Option<QuestionBank>, sqlx::Error> {
    sqlx::query_as::<_, QuestionBank>(&format!(
        "SELECT {COLUMNS} FROM question_banks WHERE id = $1 AND created_by = $2"
    ))
    .bind(id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await
}

pub(crate) struct CreateBank<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: time::PrimitiveDateTime,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    pool: &PgPool,
    params: CreateBank<'_>,
) -> Result<QuestionBank, sqlx::Error> {
    sqlx::query_as::<_, QuestionBank>(&format!(
        "INSERT INTO question_banks (id, name, description, created_by, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$6)
         RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.name)
    .bind(params.description)
    .bind(params.created_by)
    .bind(params.created_at)
    .bind(params.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) struct UpdateBank {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) updated_at: time::PrimitiveDateTime,
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    params: UpdateBank,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE question_banks SET
            name = COALESCE($1, name),
            description = COALESCE($2, description),
            updated_at = $3
         WHERE id = $4",
    )
    .bind(params.name)
    .bind(params.description)
    .bind(params.updated_at)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM question_banks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn count_owned_in(
    executor: impl sqlx::PgExecutor<'_>,
    ids: &[String],
    owner_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM question_banks WHERE id = ANY($1) AND created_by = $2",
    )
    .bind(ids)
    .bind(owner_id)
    .fetch_one(executor)
    .await
}
