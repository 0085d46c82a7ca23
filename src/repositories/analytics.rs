use sqlx::{FromRow, PgPool};

use crate::db::models::TestAnalytics;

const COLUMNS: &str = "\
    test_id, total_submissions, total_participants, average_score, pass_rate, \
    average_time_minutes, last_updated";

pub(crate) async fn find_by_test(
    pool: &PgPool,
    test_id: &str,
) -> Result<Option<TestAnalytics>, sqlx::Error> {
    sqlx::query_as::<_, TestAnalytics>(&format!(
        "SELECT {COLUMNS} FROM test_analytics WHERE test_id = $1"
    ))
    .bind(test_id)
    .fetch_optional(pool)
    .await
}

/// Recompute every aggregate for a test from its submissions table and
/// upsert the row. Always a full recompute, never an incremental delta.
pub(crate) async fn recompute(
    executor: impl sqlx::PgExecutor<'_>,
    test_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO test_analytics (
            test_id, total_submissions, total_participants, average_score,
            pass_rate, average_time_minutes, last_updated
        )
        SELECT
            $1,
            COUNT(*)::int,
            COUNT(DISTINCT COALESCE(user_id, participant_email, id))::int,
            COALESCE(AVG(score), 0),
            COALESCE(AVG(CASE WHEN is_passed THEN 100.0 ELSE 0.0 END), 0),
            COALESCE(AVG(time_taken_minutes), 0),
            $2
        FROM test_submissions
        WHERE test_id = $1
        ON CONFLICT (test_id) DO UPDATE SET
            total_submissions = EXCLUDED.total_submissions,
            total_participants = EXCLUDED.total_participants,
            average_score = EXCLUDED.average_score,
            pass_rate = EXCLUDED.pass_rate,
            average_time_minutes = EXCLUDED.average_time_minutes,
            last_updated = EXCLUDED.last_updated",
    )
    .bind(test_id)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Debug, FromRow)]
pub(crate) struct AnalyticsRollup {
    pub(crate) test_id: String,
    pub(crate) total_submissions: i32,
    pub(crate) average_score: f64,
}

pub(crate) async fn rollups_for_tests(
    pool: &PgPool,
    test_ids: &[String],
) -> Result<Vec<AnalyticsRollup>, sqlx::Error> {
    sqlx::query_as::<_, AnalyticsRollup>(
        "SELECT test_id, total_submissions, average_score
         FROM test_analytics WHERE test_id = ANY($1)",
    )
    .bind(test_ids)
    .fetch_all(pool)
    .await
}

#[derive(Debug, FromRow)]
pub(crate) struct DashboardTotals {
    pub(crate) total_tests: i64,
    pub(crate) active_tests: i64,
    pub(crate) total_submissions: i64,
    pub(crate) average_score: f64,
}

/// Owner-wide rollup across every test the user created.
pub(crate) async fn dashboard_totals(
    pool: &PgPool,
    owner_id: &str,
) -> Result<DashboardTotals, sqlx::Error> {
    sqlx::query_as::<_, DashboardTotals>(
        "SELECT
            (SELECT COUNT(*) FROM tests WHERE created_by = $1) AS total_tests,
            (SELECT COUNT(*) FROM tests WHERE created_by = $1 AND is_active) AS active_tests,
            COUNT(s.id) AS total_submissions,
            COALESCE(AVG(s.score), 0) AS average_score
         FROM test_submissions s
         JOIN tests t ON t.id = s.test_id
         WHERE t.created_by = $1",
    )
    .bind(owner_id)
    .fetch_one(pool)
    .await
}
