use crate::entities::{upload_chunks, upload_sessions};
use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm::{ConnectionTrait, Schema, Statement};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

    info!("📂 Database: {}", db_url);

    let mut opt = ConnectOptions::new(&db_url);
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    let builder = db.get_database_backend();

    if builder == sea_orm::DatabaseBackend::Postgres {
        info!("🔄 Running SQL migrations...");
        let pool = db.get_postgres_connection_pool();
        match sqlx::migrate!("./migrations").run(pool).await {
            Ok(()) => info!("✅ Migrations applied"),
            Err(e) => tracing::warn!("Migration warning (continuing): {}", e),
        }
        return Ok(());
    }

    // SQLite path used by tests and local hacking: derive the schema
    // straight from the entities
    let schema = Schema::new(builder);

    info!("🔄 Running auto-migrations...");

    // Order matters for the foreign key: sessions before chunks
    let stmts = vec![
        (
            "upload_sessions",
            schema
                .create_table_from_entity(upload_sessions::Entity)
                .if_not_exists()
                .to_owned(),
        ),
        (
            "upload_chunks",
            schema
                .create_table_from_entity(upload_chunks::Entity)
                .if_not_exists()
                .to_owned(),
        ),
    ];

    for (name, stmt) in stmts {
        let stmt = builder.build(&stmt);
        match db.execute(stmt).await {
            Ok(_) => info!("   - Table '{}' checked/created", name),
            Err(e) => tracing::warn!("   - Failed to create table '{}': {}", name, e),
        }
    }

    let indexes = vec![
        "CREATE INDEX IF NOT EXISTS idx_upload_sessions_status_activity ON upload_sessions(status, last_activity_at)",
        "CREATE INDEX IF NOT EXISTS idx_upload_chunks_upload_id ON upload_chunks(upload_id)",
    ];

    for query in indexes {
        match db
            .execute(Statement::from_string(builder, query.to_owned()))
            .await
        {
            Ok(_) => info!("   - Index checked/created: {}", query),
            Err(e) => tracing::warn!("   - Index creation warning: {} -> {}", query, e),
        }
    }

    Ok(())
}
