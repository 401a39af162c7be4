//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up
//! idempotently on every start. All `CREATE TABLE` statements use
//! `IF NOT EXISTS` so re-running against an existing database is safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Pragmas go on the connect options, not a one-off query: foreign_keys
    // and busy_timeout are per-connection, and the pool opens more than one.
    // WAL allows concurrent readers with one writer; submissions from
    // different users run in parallel against the same file.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_usuarios_table(&pool).await?;
    create_inspecciones_table(&pool).await?;
    create_reportes_table(&pool).await?;

    Ok(pool)
}

/// In-memory pool with the full schema, for tests.
pub async fn init_database_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_usuarios_table(&pool).await?;
    create_inspecciones_table(&pool).await?;
    create_reportes_table(&pool).await?;

    Ok(pool)
}

async fn create_usuarios_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS usuarios (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre TEXT NOT NULL UNIQUE,
            pin_hash TEXT NOT NULL,
            pin_salt TEXT NOT NULL,
            token TEXT,
            token_expira TIMESTAMP,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Token lookup happens on every authenticated request
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_usuarios_token ON usuarios(token)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_inspecciones_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS inspecciones (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            usuario_id INTEGER NOT NULL REFERENCES usuarios(id) ON DELETE CASCADE,
            placa TEXT NOT NULL,
            proceso TEXT NOT NULL,
            desde TEXT NOT NULL,
            hasta TEXT NOT NULL,
            marca TEXT,
            gasolina TEXT,
            modelo TEXT,
            motor TEXT,
            tipo_vehiculo TEXT,
            linea TEXT,
            licencia_num TEXT,
            licencia_venc TEXT,
            porte_propiedad TEXT,
            soat TEXT,
            certificado_emision TEXT,
            poliza_seguro TEXT,
            aspectos TEXT NOT NULL DEFAULT '{}',
            observaciones TEXT,
            condiciones_optimas TEXT,
            firma_file TEXT,
            fecha TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Pending-count and oldest-first batch fetch both scan by user and date
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_inspecciones_usuario_fecha ON inspecciones(usuario_id, fecha)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_reportes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reportes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            nombre_conductor TEXT NOT NULL,
            fecha_reporte TIMESTAMP NOT NULL,
            archivo_pdf TEXT NOT NULL,
            total_incluidas INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
