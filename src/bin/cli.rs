//! Memoria CLI
//!
//! Operator tool for migrations, status checks, and working with a user's
//! memories from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use memoria::config::{validate_config, Config, LogConfig, LogFormat, StorageBackendType};
use memoria::core::types::{SaveMemoryRequest, SearchMemoryRequest};
use memoria::database::{init_pool, init_pool_for_migrations, migrations, PgMemoryStore};
use memoria::core::VectorStore;
use memoria::{AppContext, Error, VERSION};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "memoria",
    version = VERSION,
    about = "Memoria - memory consolidation and retrieval engine",
    long_about = None
)]
struct Cli {
    /// User whose memories to operate on
    #[arg(long, short, global = true, env = "MEMORIA_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,

    /// Check configuration and storage
    Status,

    /// Save a statement
    Save {
        /// The statement to remember
        content: String,
        /// Category tag
        #[arg(long)]
        category: Option<String>,
        /// Project tag
        #[arg(long)]
        project: Option<String>,
        /// Provenance tag
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// Search current memories
    Search {
        /// What to look for
        query: String,
        /// Maximum results (1-10)
        #[arg(long, short)]
        limit: Option<usize>,
        /// Only memories with this category
        #[arg(long)]
        category: Option<String>,
        /// Only memories with this project
        #[arg(long)]
        project: Option<String>,
    },

    /// Delete a memory
    Delete {
        /// Memory ID
        id: Uuid,
    },

    /// Show a memory in any state
    Get {
        /// Memory ID
        id: Uuid,
    },

    /// Show every version of a memory's chain
    History {
        /// Any memory ID in the chain
        id: Uuid,
    },

    /// Show relations of a memory
    Relations {
        /// Memory ID
        id: Uuid,
    },

    /// Show the user's memory count
    Count,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteOutput {
    id: Uuid,
    deleted: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CountOutput<'a> {
    user_id: &'a str,
    count: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log);

    match cli.command {
        Commands::Migrate => run_migrations(&config).await,
        Commands::Status => check_status(&config).await,
        command => {
            let user = cli
                .user
                .context("A user is required: pass --user or set MEMORIA_USER")?;
            let context = AppContext::init(config)
                .await
                .context("Failed to initialize memoria")?;
            let outcome = run_command(&context, &user, command).await;
            context.shutdown().await;
            outcome
        }
    }
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_new(&log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn run_command(context: &AppContext, user: &str, command: Commands) -> Result<()> {
    let consolidation = context.consolidation();

    match command {
        Commands::Save {
            content,
            category,
            project,
            source,
        } => {
            let request = SaveMemoryRequest {
                content,
                category,
                project,
                source,
            };
            let response = consolidation
                .save(user, request)
                .await
                .context("Save failed")?;
            print_json(&response)
        }
        Commands::Search {
            query,
            limit,
            category,
            project,
        } => {
            let request = SearchMemoryRequest {
                query,
                limit,
                category,
                project,
            };
            let response = context
                .search()
                .search(user, request)
                .await
                .context("Search failed")?;
            print_json(&response)
        }
        Commands::Delete { id } => {
            let deleted = consolidation
                .delete(user, id)
                .await
                .context("Delete failed")?;
            print_json(&DeleteOutput { id, deleted })
        }
        Commands::Get { id } => {
            let memory = consolidation
                .get(user, id)
                .await
                .context("Lookup failed")?
                .ok_or_else(|| Error::NotFound(format!("memory {}", id)))?;
            print_json(&memory)
        }
        Commands::History { id } => {
            let chain = consolidation
                .history(user, id)
                .await
                .context("History lookup failed")?;
            print_json(&chain)
        }
        Commands::Relations { id } => {
            let relations = consolidation
                .relations(user, id)
                .await
                .context("Relations lookup failed")?;
            print_json(&relations)
        }
        Commands::Count => {
            let count = consolidation.count(user).await.context("Count failed")?;
            print_json(&CountOutput {
                user_id: user,
                count,
            })
        }
        Commands::Migrate | Commands::Status => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run database migrations
async fn run_migrations(config: &Config) -> Result<()> {
    println!("Running database migrations...\n");

    let postgres = config
        .storage
        .postgres
        .as_ref()
        .context("PostgreSQL not configured for migrations (set DATABASE_URL)")?;
    // Skips the pgvector check; the migrations create the extension
    let pool = init_pool_for_migrations(postgres).await?;
    migrations::run(&pool, config.storage.embedding.dimensions).await?;
    pool.close().await;

    println!("{} Migrations complete", style("✓").green());
    Ok(())
}

/// Check configuration and storage
async fn check_status(config: &Config) -> Result<()> {
    println!("{}\n", style(format!("Memoria {}", VERSION)).cyan().bold());

    let validation = validate_config(config);
    if validation.valid {
        println!("   {} Configuration valid", style("✓").green());
    } else {
        for issue in &validation.errors {
            println!("   {} {}", style("✗").red(), issue);
        }
    }
    for issue in &validation.warnings {
        println!("   {} {}", style("!").yellow(), issue);
    }

    println!(
        "      └─ Embedding: {} ({} dims)",
        style(&config.storage.embedding.model).cyan(),
        config.storage.embedding.dimensions
    );
    let model = config
        .provider
        .openrouter
        .as_ref()
        .map(|o| o.default_model.as_str())
        .unwrap_or("not configured");
    println!("      └─ LLM: {}", style(model).cyan());

    match config.storage.backend {
        StorageBackendType::Memory => {
            println!("   {} Storage: in-memory", style("○").dim());
        }
        StorageBackendType::Postgres => match &config.storage.postgres {
            Some(postgres) => match init_pool(postgres).await {
                Ok(pool) => {
                    let healthy = PgMemoryStore::new(pool.clone()).health_check().await;
                    match healthy {
                        Ok(true) => println!("   {} PostgreSQL: connected", style("✓").green()),
                        Ok(false) => println!("   {} PostgreSQL: unhealthy", style("✗").red()),
                        Err(e) => println!("   {} PostgreSQL: {}", style("✗").red(), e),
                    }
                    pool.close().await;
                }
                Err(e) => println!("   {} PostgreSQL: {}", style("✗").red(), e),
            },
            None => println!("   {} PostgreSQL: not configured", style("✗").red()),
        },
    }

    Ok(())
}
