//! Memory storage and retrieval backed by PostgreSQL + pgvector

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::FromRow;
use tracing::debug;
use uuid::Uuid;

use crate::core::storage::{VectorStore, WriteBatch};
use crate::core::types::{Memory, MemoryRelation, MemoryState, ScoredMemory, SearchFilter};
use crate::database::PostgresPool;
use crate::error::{Error, Result};

const MEMORY_COLUMNS: &str = "id, user_id, content, expanded_content, embedding, category, project, \
     source, state, supersedes_id, root_id, version, created_at, state_changed_at";

/// Row shape of the `memories` table
#[derive(Debug, FromRow)]
struct MemoryRow {
    id: Uuid,
    user_id: String,
    content: String,
    expanded_content: Option<String>,
    embedding: Vector,
    category: Option<String>,
    project: Option<String>,
    source: String,
    state: String,
    supersedes_id: Option<Uuid>,
    root_id: Uuid,
    version: i32,
    created_at: DateTime<Utc>,
    state_changed_at: Option<DateTime<Utc>>,
}

impl TryFrom<MemoryRow> for Memory {
    type Error = Error;

    fn try_from(row: MemoryRow) -> Result<Self> {
        Ok(Memory {
            id: row.id,
            user_id: row.user_id,
            content: row.content,
            expanded_content: row.expanded_content,
            embedding: row.embedding.to_vec(),
            category: row.category,
            project: row.project,
            source: row.source,
            state: row.state.parse()?,
            supersedes_id: row.supersedes_id,
            root_id: row.root_id,
            version: row.version,
            created_at: row.created_at,
            state_changed_at: row.state_changed_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ScoredRow {
    #[sqlx(flatten)]
    memory: MemoryRow,
    distance: f64,
}

#[derive(Debug, FromRow)]
struct RelationRow {
    id: Uuid,
    source_id: Uuid,
    target_id: Uuid,
    relation_type: String,
    strength: f64,
    created_at: DateTime<Utc>,
}

impl TryFrom<RelationRow> for MemoryRelation {
    type Error = Error;

    fn try_from(row: RelationRow) -> Result<Self> {
        Ok(MemoryRelation {
            id: row.id,
            source_id: row.source_id,
            target_id: row.target_id,
            relation_type: row.relation_type.parse()?,
            strength: row.strength,
            created_at: row.created_at,
        })
    }
}

/// Map unique-constraint violations to write conflicts
fn conflict_or_database(err: sqlx::Error) -> Error {
    if let sqlx::Error::Database(ref db) = err {
        if db.code().as_deref() == Some("23505") {
            return Error::Conflict(db.message().to_string());
        }
    }
    Error::Database(err)
}

/// Memory store backed by PostgreSQL + pgvector
#[derive(Clone)]
pub struct PgMemoryStore {
    pg_pool: PostgresPool,
}

impl PgMemoryStore {
    /// Create a new memory store
    pub fn new(pg_pool: PostgresPool) -> Self {
        PgMemoryStore { pg_pool }
    }
}

#[async_trait]
impl VectorStore for PgMemoryStore {
    fn id(&self) -> &str {
        "postgres"
    }

    async fn nearest_active(
        &self,
        user_id: &str,
        embedding: &[f32],
        max_distance: f64,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<ScoredMemory>> {
        let embedding = Vector::from(embedding.to_vec());

        debug!(
            "nearest_active: user={}, max_distance={}, limit={}, filter={:?}",
            user_id, max_distance, limit, filter
        );

        let rows: Vec<ScoredRow> = sqlx::query_as(&format!(
            r#"
            SELECT {MEMORY_COLUMNS}, (embedding <=> $1)::float8 AS distance
            FROM memories
            WHERE user_id = $2
              AND state = 'active'
              AND (embedding <=> $1) < $3
              AND ($4::text IS NULL OR category = $4)
              AND ($5::text IS NULL OR project = $5)
            ORDER BY embedding <=> $1
            LIMIT $6
            "#
        ))
        .bind(&embedding)
        .bind(user_id)
        .bind(max_distance)
        .bind(&filter.category)
        .bind(&filter.project)
        .bind(limit as i64)
        .fetch_all(&self.pg_pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ScoredMemory {
                    memory: row.memory.try_into()?,
                    distance: row.distance,
                })
            })
            .collect()
    }

    async fn write(&self, batch: &WriteBatch) -> Result<()> {
        let memory = &batch.memory;
        let mut tx = self.pg_pool.begin().await?;

        // Supersede first so the one-active-per-chain index never sees two rows
        if let Some(candidate) = batch.supersedes {
            let updated = sqlx::query(
                r#"
                UPDATE memories
                SET state = 'superseded', state_changed_at = NOW()
                WHERE id = $1 AND user_id = $2 AND state = 'active'
                "#,
            )
            .bind(candidate)
            .bind(&memory.user_id)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                tx.rollback().await?;
                return Err(Error::Conflict(format!(
                    "memory {} is no longer active",
                    candidate
                )));
            }
        }

        sqlx::query(&format!(
            r#"
            INSERT INTO memories ({MEMORY_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#
        ))
        .bind(memory.id)
        .bind(&memory.user_id)
        .bind(&memory.content)
        .bind(&memory.expanded_content)
        .bind(Vector::from(memory.embedding.clone()))
        .bind(&memory.category)
        .bind(&memory.project)
        .bind(&memory.source)
        .bind(memory.state.as_str())
        .bind(memory.supersedes_id)
        .bind(memory.root_id)
        .bind(memory.version)
        .bind(memory.created_at)
        .bind(memory.state_changed_at)
        .execute(&mut *tx)
        .await
        .map_err(conflict_or_database)?;

        if let Some(ref relation) = batch.relation {
            sqlx::query(
                r#"
                INSERT INTO memory_relations (id, source_id, target_id, relation_type, strength, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(relation.id)
            .bind(relation.source_id)
            .bind(relation.target_id)
            .bind(relation.relation_type.as_str())
            .bind(relation.strength)
            .bind(relation.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn transition_state(&self, user_id: &str, id: Uuid, to: MemoryState) -> Result<bool> {
        let from: Vec<String> = MemoryState::predecessors(to)
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        if from.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no memory may transition to {}",
                to
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE memories
            SET state = $1, state_changed_at = NOW()
            WHERE id = $2 AND user_id = $3 AND state = ANY($4)
            "#,
        )
        .bind(to.as_str())
        .bind(id)
        .bind(user_id)
        .bind(&from)
        .execute(&self.pg_pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, user_id: &str, id: Uuid) -> Result<Option<Memory>> {
        let row: Option<MemoryRow> = sqlx::query_as(&format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pg_pool)
        .await?;

        row.map(Memory::try_from).transpose()
    }

    async fn chain(&self, user_id: &str, root_id: Uuid) -> Result<Vec<Memory>> {
        let rows: Vec<MemoryRow> = sqlx::query_as(&format!(
            r#"
            SELECT {MEMORY_COLUMNS}
            FROM memories
            WHERE user_id = $1 AND root_id = $2
            ORDER BY version ASC
            "#
        ))
        .bind(user_id)
        .bind(root_id)
        .fetch_all(&self.pg_pool)
        .await?;

        rows.into_iter().map(Memory::try_from).collect()
    }

    async fn relations(&self, user_id: &str, id: Uuid) -> Result<Vec<MemoryRelation>> {
        let rows: Vec<RelationRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.source_id, r.target_id, r.relation_type, r.strength, r.created_at
            FROM memory_relations r
            JOIN memories m ON m.id = r.source_id
            WHERE m.user_id = $1 AND (r.source_id = $2 OR r.target_id = $2)
            ORDER BY r.created_at ASC
            "#,
        )
        .bind(user_id)
        .bind(id)
        .fetch_all(&self.pg_pool)
        .await?;

        rows.into_iter().map(MemoryRelation::try_from).collect()
    }

    async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").execute(&self.pg_pool).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(state: &str) -> MemoryRow {
        let id = Uuid::new_v4();
        MemoryRow {
            id,
            user_id: "user".into(),
            content: "I use pnpm".into(),
            expanded_content: Some("The user uses pnpm as package manager".into()),
            embedding: Vector::from(vec![0.1, 0.2, 0.3]),
            category: Some("tooling".into()),
            project: None,
            source: "cli".into(),
            state: state.into(),
            supersedes_id: None,
            root_id: id,
            version: 1,
            created_at: Utc::now(),
            state_changed_at: None,
        }
    }

    #[test]
    fn test_row_conversion() {
        let memory = Memory::try_from(row("superseded")).unwrap();
        assert_eq!(memory.state, MemoryState::Superseded);
        assert_eq!(memory.embedding, vec![0.1, 0.2, 0.3]);
        assert!(memory.is_originator());
    }

    #[test]
    fn test_row_with_unknown_state_is_rejected() {
        assert!(Memory::try_from(row("archived")).is_err());
    }

    #[test]
    fn test_relation_row_conversion() {
        let relation = MemoryRelation::try_from(RelationRow {
            id: Uuid::new_v4(),
            source_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            relation_type: "extends".into(),
            strength: 0.82,
            created_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(relation.relation_type, crate::core::types::RelationType::Extends);
    }
}
