//! Per-user memory counts in PostgreSQL

use async_trait::async_trait;

use crate::core::storage::CounterService;
use crate::database::PostgresPool;
use crate::error::Result;

/// Counter service backed by the `memory_counts` table
#[derive(Clone)]
pub struct PgCounterStore {
    pg_pool: PostgresPool,
}

impl PgCounterStore {
    /// Create a new counter store
    pub fn new(pg_pool: PostgresPool) -> Self {
        PgCounterStore { pg_pool }
    }
}

#[async_trait]
impl CounterService for PgCounterStore {
    async fn increment(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO memory_counts (user_id, count)
            VALUES ($1, 1)
            ON CONFLICT (user_id) DO UPDATE SET
                count = memory_counts.count + 1,
                updated_at = NOW()
            RETURNING count
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pg_pool)
        .await?;

        Ok(count)
    }

    async fn decrement(&self, user_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO memory_counts (user_id, count)
            VALUES ($1, 0)
            ON CONFLICT (user_id) DO UPDATE SET
                count = GREATEST(memory_counts.count - 1, 0),
                updated_at = NOW()
            RETURNING count
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pg_pool)
        .await?;

        Ok(count)
    }

    async fn count(&self, user_id: &str) -> Result<i64> {
        let count: Option<(i64,)> =
            sqlx::query_as("SELECT count FROM memory_counts WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pg_pool)
                .await?;

        Ok(count.map(|(c,)| c).unwrap_or(0))
    }
}
