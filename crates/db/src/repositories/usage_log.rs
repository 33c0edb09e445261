//! Usage log repository.
//!
//! Consumption is serialized per `(user_id, resource)` with a transaction-scoped
//! advisory lock, and the insert itself is conditional on the window counts, so
//! concurrent callers can never push usage past a ceiling.

use std::sync::Arc;

use crate::entities::usage_log::UsageResource;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, QueryResult, Statement, TransactionTrait,
};
use socialcast_common::{AppError, AppResult};

const ADVISORY_LOCK_SQL: &str = "SELECT pg_advisory_xact_lock(hashtext($1 || ':' || $2))";

const CONDITIONAL_INSERT_SQL: &str = r"
    INSERT INTO usage_log (id, user_id, resource, created_at)
    SELECT $1, $2, $3, $4
    WHERE ($7 < 0 OR (
            SELECT COUNT(*) FROM usage_log
            WHERE user_id = $2 AND resource = $3 AND created_at >= $5
        ) < $7)
      AND ($8 < 0 OR (
            SELECT COUNT(*) FROM usage_log
            WHERE user_id = $2 AND resource = $3 AND created_at >= $6
        ) < $8)
    RETURNING id
";

const WINDOW_COUNTS_SQL: &str = r"
    SELECT
        COUNT(*) FILTER (WHERE created_at >= $3) AS daily,
        COUNT(*) FILTER (WHERE created_at >= $4) AS monthly
    FROM usage_log
    WHERE user_id = $1 AND resource = $2
";

/// Usage inside the current UTC day and UTC month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageCounts {
    /// Entries since 00:00 UTC today.
    pub daily: i64,
    /// Entries since the first of the month, 00:00 UTC.
    pub monthly: i64,
}

/// Start of the UTC day containing `now`.
#[must_use]
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Start of the UTC month containing `now`.
#[must_use]
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Usage log repository for database operations.
#[derive(Clone)]
pub struct UsageLogRepository {
    db: Arc<DatabaseConnection>,
}

impl UsageLogRepository {
    /// Create a new usage log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Record one unit of usage if both ceilings allow it.
    ///
    /// A negative limit is unlimited. Returns whether a row was inserted and
    /// the counts after the decision.
    pub async fn try_consume(
        &self,
        id: &str,
        user_id: &str,
        resource: UsageResource,
        now: DateTime<Utc>,
        daily_limit: i64,
        monthly_limit: i64,
    ) -> AppResult<(bool, UsageCounts)> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.execute(Statement::from_sql_and_values(
            DbBackend::Postgres,
            ADVISORY_LOCK_SQL,
            [user_id.into(), resource.as_str().into()],
        ))
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        let inserted = txn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                CONDITIONAL_INSERT_SQL,
                [
                    id.into(),
                    user_id.into(),
                    resource.as_str().into(),
                    now.into(),
                    day_start(now).into(),
                    month_start(now).into(),
                    daily_limit.into(),
                    monthly_limit.into(),
                ],
            ))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .is_some();

        let counts = Self::query_counts(&txn, user_id, resource, now).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((inserted, counts))
    }

    /// Current usage without consuming.
    pub async fn counts(
        &self,
        user_id: &str,
        resource: UsageResource,
        now: DateTime<Utc>,
    ) -> AppResult<UsageCounts> {
        Self::query_counts(self.db.as_ref(), user_id, resource, now).await
    }

    async fn query_counts<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        resource: UsageResource,
        now: DateTime<Utc>,
    ) -> AppResult<UsageCounts> {
        let row = conn
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                WINDOW_COUNTS_SQL,
                [
                    user_id.into(),
                    resource.as_str().into(),
                    day_start(now).into(),
                    month_start(now).into(),
                ],
            ))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map_or_else(|| Ok(UsageCounts::default()), |row| read_counts(&row))
    }
}

fn read_counts(row: &QueryResult) -> AppResult<UsageCounts> {
    let daily = row
        .try_get::<i64>("", "daily")
        .map_err(|e| AppError::Database(e.to_string()))?;
    let monthly = row
        .try_get::<i64>("", "monthly")
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(UsageCounts { daily, monthly })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn counts_row(daily: i64, monthly: i64) -> BTreeMap<&'static str, Value> {
        maplit::btreemap! {
            "daily" => Value::BigInt(Some(daily)),
            "monthly" => Value::BigInt(Some(monthly)),
        }
    }

    fn lock_result() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[test]
    fn test_windows_are_utc_calendar_boundaries() {
        let now = Utc.with_ymd_and_hms(2025, 3, 17, 23, 59, 59).unwrap();
        assert_eq!(
            day_start(now),
            Utc.with_ymd_and_hms(2025, 3, 17, 0, 0, 0).unwrap()
        );
        assert_eq!(
            month_start(now),
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_conditional_insert_checks_both_windows() {
        assert!(CONDITIONAL_INSERT_SQL.contains("created_at >= $5"));
        assert!(CONDITIONAL_INSERT_SQL.contains("created_at >= $6"));
        assert!(CONDITIONAL_INSERT_SQL.contains("$7 < 0"));
        assert!(CONDITIONAL_INSERT_SQL.contains("$8 < 0"));
        assert!(ADVISORY_LOCK_SQL.contains("pg_advisory_xact_lock"));
    }

    #[tokio::test]
    async fn test_try_consume_allowed() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([lock_result()])
                .append_query_results([vec![maplit::btreemap! {
                    "id" => Value::String(Some(Box::new("u1".to_string()))),
                }]])
                .append_query_results([vec![counts_row(1, 1)]])
                .into_connection(),
        );

        let repo = UsageLogRepository::new(db);
        let (inserted, counts) = repo
            .try_consume("u1", "user1", UsageResource::PostCreation, Utc::now(), 1, 50)
            .await
            .unwrap();

        assert!(inserted);
        assert_eq!(counts, UsageCounts { daily: 1, monthly: 1 });
    }

    #[tokio::test]
    async fn test_try_consume_denied_inserts_nothing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([lock_result()])
                .append_query_results([Vec::<BTreeMap<&str, Value>>::new()])
                .append_query_results([vec![counts_row(1, 1)]])
                .into_connection(),
        );

        let repo = UsageLogRepository::new(db);
        let (inserted, counts) = repo
            .try_consume("u2", "user1", UsageResource::PostCreation, Utc::now(), 1, 50)
            .await
            .unwrap();

        assert!(!inserted);
        assert_eq!(counts.daily, 1);
    }

    #[tokio::test]
    async fn test_counts() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![counts_row(3, 40)]])
                .into_connection(),
        );

        let repo = UsageLogRepository::new(db);
        let counts = repo
            .counts("user1", UsageResource::AiRequest, Utc::now())
            .await
            .unwrap();
        assert_eq!(counts, UsageCounts { daily: 3, monthly: 40 });
    }
}
