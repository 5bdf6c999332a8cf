use crate::error::Result;
use crate::types::{Bay, GeoPoint};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

pub const DB_FILE_NAME: &str = "parking_assistant.db";

/// Open (creating if needed) the database file and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    let pool = connect(&db_url, 5).await?;

    // Enable WAL mode for better concurrent read performance
    sqlx::query("PRAGMA journal_mode=WAL;").execute(&pool).await?;

    run_migrations(&pool).await?;
    Ok(pool)
}

/// Connect to `db_url` without touching the filesystem layout.
pub async fn connect(db_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?;
    Ok(pool)
}

/// Run migrations by executing SQL files in order.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    let migrations: &[(&str, &str)] = &[("001_initial", include_str!("../migrations/001_initial.sql"))];

    for (name, sql) in migrations {
        let applied: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?")
            .bind(name)
            .fetch_one(pool)
            .await?;

        if !applied {
            for statement in sql.split(';') {
                let trimmed = statement.trim();
                if !trimmed.is_empty() {
                    sqlx::query(trimmed).execute(pool).await?;
                }
            }

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await?;

            info!(event = "db.migration_applied", migration = name);
        }
    }

    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct BayRow {
    bay_id: i64,
    lat: f64,
    lng: f64,
    description: Option<String>,
}

/// The stored bay catalogue. Occupancy starts unknown (`available = false`).
pub async fn load_bays(pool: &SqlitePool) -> Result<Vec<Bay>> {
    let rows: Vec<BayRow> =
        sqlx::query_as("SELECT bay_id, lat, lng, description FROM bays ORDER BY bay_id")
            .fetch_all(pool)
            .await?;

    Ok(rows
        .into_iter()
        .map(|r| Bay {
            bay_id: r.bay_id,
            position: GeoPoint::new(r.lat, r.lng),
            description: r.description,
            available: false,
            status_updated_at: None,
        })
        .collect())
}

/// Upsert the catalogue in one transaction. Returns the number of rows written.
pub async fn save_bays(pool: &SqlitePool, bays: &[Bay]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let mut written = 0;
    for bay in bays {
        let result = sqlx::query(
            "INSERT INTO bays (bay_id, lat, lng, description) VALUES (?, ?, ?, ?)
             ON CONFLICT(bay_id) DO UPDATE SET
                lat = excluded.lat,
                lng = excluded.lng,
                description = excluded.description",
        )
        .bind(bay.bay_id)
        .bind(bay.position.lat)
        .bind(bay.position.lng)
        .bind(&bay.description)
        .execute(&mut *tx)
        .await?;
        written += result.rows_affected();
    }
    tx.commit().await?;
    Ok(written)
}
