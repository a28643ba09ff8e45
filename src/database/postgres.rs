//! PostgreSQL database connection and migrations

use crate::config::PostgresConfig;
use crate::error::{Error, Result};
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// PostgreSQL connection pool type alias
pub type PostgresPool = PgPool;

/// Initialize the PostgreSQL connection pool
pub async fn init_pool(config: &PostgresConfig) -> Result<PostgresPool> {
    init_pool_with_options(config, true).await
}

/// Initialize the PostgreSQL connection pool without pgvector check
/// Use this for running migrations before pgvector is installed
pub async fn init_pool_for_migrations(config: &PostgresConfig) -> Result<PostgresPool> {
    init_pool_with_options(config, false).await
}

/// Initialize the PostgreSQL connection pool with options
async fn init_pool_with_options(config: &PostgresConfig, require_pgvector: bool) -> Result<PostgresPool> {
    info!("Initializing PostgreSQL connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(config.url.expose_secret())
        .await?;

    // Verify connection and optionally check for required extensions
    verify_database(&pool, require_pgvector).await?;

    info!("PostgreSQL connection pool initialized successfully");
    Ok(pool)
}

/// Verify database connection and optionally check for required extensions
async fn verify_database(pool: &PgPool, require_pgvector: bool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    if require_pgvector {
        let result: Option<(String,)> = sqlx::query_as(
            "SELECT extname FROM pg_extension WHERE extname = 'vector'"
        )
        .fetch_optional(pool)
        .await?;

        if result.is_none() {
            return Err(Error::Database(sqlx::Error::Configuration(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".into()
            )));
        }
    }

    Ok(())
}

/// Database migrations
pub mod migrations {
    use super::*;
    use tracing::warn;

    /// Schema statements in execution order (each must be a separate query for SQLx)
    ///
    /// Nearest-neighbor queries filter on user and state before ordering by
    /// distance, so they are served exactly by `idx_memories_user_state`. No
    /// approximate vector index is created: ivfflat/hnsw post-filter their
    /// candidates and can miss a user's closest memory.
    pub fn statements(dimensions: u32) -> Vec<String> {
        vec![
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS memories (
                    id UUID PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    content TEXT NOT NULL,
                    expanded_content TEXT,
                    embedding vector({dimensions}) NOT NULL,
                    category TEXT,
                    project TEXT,
                    source TEXT NOT NULL DEFAULT '',
                    state TEXT NOT NULL DEFAULT 'active'
                        CHECK (state IN ('active', 'superseded', 'deleted')),
                    supersedes_id UUID REFERENCES memories(id),
                    root_id UUID NOT NULL,
                    version INTEGER NOT NULL DEFAULT 1 CHECK (version >= 1),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    state_changed_at TIMESTAMPTZ
                )
                "#
            ),
            r#"
            CREATE TABLE IF NOT EXISTS memory_relations (
                id UUID PRIMARY KEY,
                source_id UUID NOT NULL REFERENCES memories(id),
                target_id UUID NOT NULL REFERENCES memories(id),
                relation_type TEXT NOT NULL CHECK (relation_type IN ('extends', 'similar')),
                strength DOUBLE PRECISION NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
            .to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS memory_counts (
                user_id TEXT PRIMARY KEY,
                count BIGINT NOT NULL DEFAULT 0 CHECK (count >= 0),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
            .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_memories_user_state ON memories(user_id, state)".to_string(),
            "CREATE INDEX IF NOT EXISTS idx_memories_root ON memories(user_id, root_id, version)"
                .to_string(),
            // At most one Active memory per chain
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_memories_one_active_per_chain
            ON memories(user_id, root_id) WHERE state = 'active'
            "#
            .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_memory_relations_source ON memory_relations(source_id)"
                .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_memory_relations_target ON memory_relations(target_id)"
                .to_string(),
        ]
    }

    /// Run all migrations
    ///
    /// `dimensions` fixes the width of the embedding column and must match
    /// the embedding model.
    pub async fn run(pool: &PgPool, dimensions: u32) -> Result<()> {
        info!("Running database migrations");

        // Try to create pgvector extension (requires superuser or extension already available)
        match sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(pool)
            .await
        {
            Ok(_) => info!("pgvector extension enabled"),
            Err(e) => {
                warn!("Could not create pgvector extension: {}. Vector features may not work.", e);
                warn!("If you need vector support, run as superuser: CREATE EXTENSION vector;");
            }
        }

        for statement in statements(dimensions) {
            sqlx::query(&statement).execute(pool).await?;
        }

        info!("Database migrations completed");
        Ok(())
    }

}
