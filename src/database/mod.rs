//! Database module - PostgreSQL + pgvector, and an in-process fallback
//!
//! Provides storage for:
//! - PostgreSQL with pgvector: memories, relations, and per-user counts
//! - In-memory maps: the same capabilities without persistence

mod counter;
mod in_memory;
mod memory;
mod postgres;

pub use counter::PgCounterStore;
pub use in_memory::{cosine_distance, DistanceFn, InMemoryStore};
pub use memory::PgMemoryStore;
pub use postgres::{init_pool, init_pool_for_migrations, migrations, PostgresPool};
