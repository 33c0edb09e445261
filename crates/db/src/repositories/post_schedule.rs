//! Post schedule repository.

use std::sync::Arc;

use crate::entities::{PostSchedule, post_schedule};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter,
    QueryOrder, Set, Statement,
};
use socialcast_common::{AppError, AppResult};

use crate::entities::post_schedule::ScheduleStatus;

const CLAIM_DUE_SQL: &str = r"
    UPDATE post_schedule
    SET status = 'publishing', updated_at = $1, claimed_by = $3
    WHERE id IN (
        SELECT id FROM post_schedule
        WHERE status = 'pending' AND scheduled_at <= $1
        ORDER BY scheduled_at ASC
        LIMIT $2
        FOR UPDATE SKIP LOCKED
    )
    RETURNING *
";

// A reclaimed row counts as one more attempt.
const CLAIM_DUE_WITH_STALE_SQL: &str = r"
    UPDATE post_schedule
    SET status = 'publishing',
        updated_at = $1,
        claimed_by = $3,
        retry_count = CASE WHEN status = 'publishing' THEN retry_count + 1 ELSE retry_count END
    WHERE id IN (
        SELECT id FROM post_schedule
        WHERE (status = 'pending' AND scheduled_at <= $1)
           OR (status = 'publishing' AND updated_at < $4)
        ORDER BY scheduled_at ASC
        LIMIT $2
        FOR UPDATE SKIP LOCKED
    )
    RETURNING *
";

/// Rows the caller still owns: in `publishing` and, when the caller holds a
/// claim token, claimed by that token.
fn owned(id: &str, claimed_by: Option<&str>) -> Condition {
    let condition = Condition::all()
        .add(post_schedule::Column::Id.eq(id))
        .add(post_schedule::Column::Status.eq(ScheduleStatus::Publishing));
    match claimed_by {
        Some(claim) => condition.add(post_schedule::Column::ClaimedBy.eq(claim)),
        None => condition,
    }
}

/// Post schedule repository for database operations.
#[derive(Clone)]
pub struct PostScheduleRepository {
    db: Arc<DatabaseConnection>,
}

impl PostScheduleRepository {
    /// Create a new post schedule repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a schedule by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post_schedule::Model>> {
        PostSchedule::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a schedule by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post_schedule::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post schedule {id} not found")))
    }

    /// Find all schedules of a post.
    pub async fn find_by_post(&self, post_id: &str) -> AppResult<Vec<post_schedule::Model>> {
        PostSchedule::find()
            .filter(post_schedule::Column::PostId.eq(post_id))
            .order_by_asc(post_schedule::Column::ScheduledAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find all schedules of several posts.
    pub async fn find_by_post_ids(
        &self,
        post_ids: &[String],
    ) -> AppResult<Vec<post_schedule::Model>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        PostSchedule::find()
            .filter(post_schedule::Column::PostId.is_in(post_ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically claim due schedules for the pass identified by `claim_id`.
    ///
    /// Pending schedules with `scheduled_at <= now` are moved to `publishing`
    /// oldest first, at most `limit` of them. Rows locked by a concurrent claim
    /// are skipped, so overlapping callers never receive the same row. When
    /// `stale_before` is given, rows left in `publishing` with an `updated_at`
    /// older than it are claimed again and their `retry_count` goes up by one.
    /// The previous owner loses the row: its later writes match nothing.
    pub async fn claim_due(
        &self,
        claim_id: &str,
        limit: u64,
        now: DateTime<Utc>,
        stale_before: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<post_schedule::Model>> {
        if limit == 0 {
            return Ok(vec![]);
        }

        let statement = match stale_before {
            Some(cutoff) => Statement::from_sql_and_values(
                DbBackend::Postgres,
                CLAIM_DUE_WITH_STALE_SQL,
                [
                    now.into(),
                    (limit as i64).into(),
                    claim_id.into(),
                    cutoff.into(),
                ],
            ),
            None => Statement::from_sql_and_values(
                DbBackend::Postgres,
                CLAIM_DUE_SQL,
                [now.into(), (limit as i64).into(), claim_id.into()],
            ),
        };

        let mut claimed = PostSchedule::find()
            .from_raw_sql(statement)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        // RETURNING does not preserve the subquery order
        claimed.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(claimed)
    }

    /// Stamp `updated_at` on an owned row so the stale sweep leaves it alone.
    /// Returns `false` if the row was lost.
    pub async fn renew_claim(
        &self,
        id: &str,
        claimed_by: Option<&str>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = PostSchedule::update_many()
            .col_expr(post_schedule::Column::UpdatedAt, Expr::value(now))
            .filter(owned(id, claimed_by))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Record a successful publish. Returns `false` if the row is no longer
    /// owned by the caller.
    pub async fn mark_published(
        &self,
        id: &str,
        claimed_by: Option<&str>,
        external_post_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = PostSchedule::update_many()
            .set(post_schedule::ActiveModel {
                status: Set(ScheduleStatus::Published),
                published_at: Set(Some(now.into())),
                external_post_id: Set(Some(external_post_id.to_string())),
                error_message: Set(None),
                claimed_by: Set(None),
                updated_at: Set(Some(now.into())),
                ..Default::default()
            })
            .filter(owned(id, claimed_by))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Put a schedule back to `pending` for another attempt at `next_attempt_at`,
    /// incrementing `retry_count`.
    pub async fn requeue(
        &self,
        id: &str,
        claimed_by: Option<&str>,
        next_attempt_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = PostSchedule::update_many()
            .set(post_schedule::ActiveModel {
                status: Set(ScheduleStatus::Pending),
                scheduled_at: Set(next_attempt_at.into()),
                claimed_by: Set(None),
                updated_at: Set(Some(now.into())),
                ..Default::default()
            })
            .col_expr(
                post_schedule::Column::RetryCount,
                Expr::col(post_schedule::Column::RetryCount).add(1),
            )
            .filter(owned(id, claimed_by))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Record a permanent failure.
    pub async fn mark_failed(
        &self,
        id: &str,
        claimed_by: Option<&str>,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = PostSchedule::update_many()
            .set(post_schedule::ActiveModel {
                status: Set(ScheduleStatus::Failed),
                error_message: Set(Some(error_message.to_string())),
                claimed_by: Set(None),
                updated_at: Set(Some(now.into())),
                ..Default::default()
            })
            .filter(owned(id, claimed_by))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Delete all schedules of the given posts.
    pub async fn delete_by_post_ids<C: ConnectionTrait>(
        conn: &C,
        post_ids: &[String],
    ) -> AppResult<u64> {
        if post_ids.is_empty() {
            return Ok(0);
        }

        let result = PostSchedule::delete_many()
            .filter(post_schedule::Column::PostId.is_in(post_ids.iter().cloned()))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction};

    fn create_test_schedule(id: &str, post_id: &str, minutes_ago: i64) -> post_schedule::Model {
        post_schedule::Model {
            id: id.to_string(),
            post_id: post_id.to_string(),
            social_account_id: "acct1".to_string(),
            scheduled_at: (Utc::now() - chrono::Duration::minutes(minutes_ago)).into(),
            status: ScheduleStatus::Publishing,
            retry_count: 0,
            claimed_by: Some("run1".to_string()),
            published_at: None,
            external_post_id: None,
            error_message: None,
            created_at: Utc::now().into(),
            updated_at: Some(Utc::now().into()),
        }
    }

    #[test]
    fn test_claim_sql_skips_locked_rows() {
        for sql in [CLAIM_DUE_SQL, CLAIM_DUE_WITH_STALE_SQL] {
            assert!(sql.contains("FOR UPDATE SKIP LOCKED"));
            assert!(sql.contains("SET status = 'publishing'"));
            assert!(sql.contains("RETURNING *"));
        }
        assert!(!CLAIM_DUE_SQL.contains("$4"));
        assert!(!CLAIM_DUE_SQL.contains("retry_count"));
        assert!(CLAIM_DUE_WITH_STALE_SQL.contains("status = 'publishing' AND updated_at < $4"));
        assert!(CLAIM_DUE_WITH_STALE_SQL.contains("THEN retry_count + 1"));
    }

    #[tokio::test]
    async fn test_claim_due_returns_oldest_first() {
        let newer = create_test_schedule("s2", "p1", 1);
        let older = create_test_schedule("s1", "p1", 10);
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![newer, older]])
                .into_connection(),
        );

        let repo = PostScheduleRepository::new(db);
        let claimed = repo.claim_due("run1", 10, Utc::now(), None).await.unwrap();

        assert_eq!(claimed.len(), 2);
        assert_eq!(claimed[0].id, "s1");
        assert_eq!(claimed[1].id, "s2");
    }

    #[tokio::test]
    async fn test_claim_due_nothing_due() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<post_schedule::Model>::new()])
                .into_connection(),
        );

        let repo = PostScheduleRepository::new(db);
        let claimed = repo.claim_due("run1", 10, Utc::now(), None).await.unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn test_claim_due_zero_limit_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = PostScheduleRepository::new(db);
        let claimed = repo.claim_due("run1", 0, Utc::now(), None).await.unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn test_claim_due_binds_stale_cutoff() {
        let now = Utc::now();
        let cutoff = now - chrono::Duration::minutes(15);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<post_schedule::Model>::new()])
            .into_connection();
        let db = Arc::new(db);

        let repo = PostScheduleRepository::new(Arc::clone(&db));
        repo.claim_due("run1", 5, now, Some(cutoff)).await.unwrap();
        drop(repo);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert_eq!(
            log,
            vec![Transaction::from_sql_and_values(
                DatabaseBackend::Postgres,
                CLAIM_DUE_WITH_STALE_SQL,
                [now.into(), 5i64.into(), "run1".into(), cutoff.into()],
            )]
        );
    }

    #[tokio::test]
    async fn test_mark_published_owned() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PostScheduleRepository::new(db);
        assert!(
            repo.mark_published("s1", Some("run1"), "fb_123", Utc::now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_mark_failed_lost_ownership() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = PostScheduleRepository::new(db);
        assert!(
            !repo
                .mark_failed("s1", Some("run1"), "boom", Utc::now())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_writes_require_the_claim_token() {
        let now = Utc::now();
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = PostScheduleRepository::new(Arc::clone(&db));
        assert!(repo.renew_claim("s1", Some("run1"), now).await.unwrap());
        drop(repo);

        let log = Arc::try_unwrap(db).ok().unwrap().into_transaction_log();
        assert_eq!(log.len(), 1);
        let sql = &log[0].statements()[0].sql;
        assert!(sql.contains(r#""claimed_by" = $"#), "{sql}");
        assert!(sql.contains(r#""status" = $"#), "{sql}");
    }

    #[tokio::test]
    async fn test_renew_claim_of_lost_row() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = PostScheduleRepository::new(db);
        assert!(!repo.renew_claim("s1", Some("run1"), Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_by_post_ids_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = PostScheduleRepository::new(db);
        assert!(repo.find_by_post_ids(&[]).await.unwrap().is_empty());
    }
}
