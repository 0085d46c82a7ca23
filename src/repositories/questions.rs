use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::db::models::Question;
use crate::db::types::{DifficultyLevel, QuestionKind};

const COLUMNS: &str = "\
    id, question_bank_id, question_text, question_type, options, \
    correct_answer, difficulty, category, created_at";

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_bank(
    pool: &PgPool,
    bank_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE question_bank_id = $1 ORDER BY created_at"
    ))
    .bind(bank_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn count_by_bank(
    executor: impl sqlx::PgExecutor<'_>,
    bank_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE question_bank_id = $1")
        .bind(bank_id)
        .fetch_one(executor)
        .await
}

/// Ids of questions in one bank matching the optional difficulty and
/// category filters, in a stable order.
pub(crate) async fn list_ids_filtered(
    pool: &PgPool,
    bank_id: &str,
    difficulty: Option<DifficultyLevel>,
    category: Option<&str>,
) -> Result<Vec<String>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT id FROM questions WHERE question_bank_id = ",
    );
    builder.push_bind(bank_id);

    if let Some(difficulty) = difficulty {
        builder.push(" AND difficulty = ");
        builder.push_bind(difficulty);
    }
    if let Some(category) = category {
        builder.push(" AND category = ");
        builder.push_bind(category);
    }

    builder.push(" ORDER BY created_at, id");
    builder.build_query_scalar::<String>().fetch_all(pool).await
}

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) question_bank_id: &'a str,
    pub(crate) question_text: &'a str,
    pub(crate) question_type: QuestionKind,
    pub(crate) options: serde_json::Value,
    pub(crate) correct_answer: &'a str,
    pub(crate) difficulty: DifficultyLevel,
    pub(crate) category: Option<&'a str>,
    pub(crate) created_at: time::PrimitiveDateTime,
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    params: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, question_bank_id, question_text, question_type, options,
            correct_answer, difficulty, category, created_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
        RETURNING {COLUMNS}",
    ))
    .bind(params.id)
    .bind(params.question_bank_id)
    .bind(params.question_text)
    .bind(params.question_type)
    .bind(params.options)
    .bind(params.correct_answer)
    .bind(params.difficulty)
    .bind(params.category)
    .bind(params.created_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
