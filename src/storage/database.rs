//! SQLite Database
//!
//! Embedded database for persistent storage using rusqlite with r2d2 connection pooling.
//! Office record tables are created from the entity schemas, so the columns
//! always match the operations the admin catalogue generates.

use std::path::Path;

use counsel_tools::{builtin_schemas, EntitySchema, FieldType};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::database_path;

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Tenant column carried by every office record table
pub const OFFICE_COLUMN: &str = "office_id";

/// Database service for managing SQLite operations
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a database from an existing connection pool.
    pub fn from_pool(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Create an in-memory database for testing.
    ///
    /// Uses an in-memory SQLite database with the same schema as the
    /// production database. The pool holds a single connection so every
    /// caller sees the same in-memory database.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Open the database at the default location (~/.counsel-desk/data.db)
    pub fn new() -> AppResult<Self> {
        Self::open(&database_path()?)
    }

    /// Open (or create) a database file with connection pooling
    pub fn open(db_path: &Path) -> AppResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;"));
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;

        tracing::debug!(path = %db_path.display(), "database opened");
        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.get_connection()?;

        for schema in builtin_schemas() {
            conn.execute(&create_table_sql(&schema), [])?;
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_office ON {table}({office})",
                    table = schema.entity.table(),
                    office = OFFICE_COLUMN
                ),
                [],
            )?;
        }

        // Knowledge base chunks, one row per article or paragraph window
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kb_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                source_title TEXT NOT NULL,
                country TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                header TEXT NOT NULL,
                content TEXT NOT NULL,
                start_offset INTEGER NOT NULL,
                end_offset INTEGER NOT NULL,
                embedding BLOB,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(source_id, chunk_index)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_kb_chunks_country ON kb_chunks(country)",
            [],
        )?;

        Ok(())
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Get the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Check if the database is healthy
    pub fn is_healthy(&self) -> bool {
        if let Ok(conn) = self.pool.get() {
            conn.query_row("SELECT 1", [], |_| Ok(())).is_ok()
        } else {
            false
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connections", &self.pool.state().connections)
            .finish()
    }
}

fn create_table_sql(schema: &EntitySchema) -> String {
    let mut columns = vec![
        "id INTEGER PRIMARY KEY AUTOINCREMENT".to_string(),
        format!("{} TEXT NOT NULL", OFFICE_COLUMN),
    ];
    for field in &schema.fields {
        let sql_type = match field.field_type {
            FieldType::Integer => "INTEGER",
            FieldType::Text | FieldType::Date => "TEXT",
        };
        let not_null = if field.required { " NOT NULL" } else { "" };
        columns.push(format!("{} {}{}", field.name, sql_type, not_null));
    }
    columns.push("created_at TEXT DEFAULT CURRENT_TIMESTAMP".to_string());
    columns.push("updated_at TEXT DEFAULT CURRENT_TIMESTAMP".to_string());

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        schema.entity.table(),
        columns.join(",\n    ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_columns(db: &Database, table: &str) -> Vec<String> {
        let conn = db.get_connection().unwrap();
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_database_health() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.is_healthy());
    }

    #[test]
    fn test_record_tables_follow_schemas() {
        let db = Database::new_in_memory().unwrap();
        for schema in builtin_schemas() {
            let columns = table_columns(&db, schema.entity.table());
            assert!(columns.contains(&"office_id".to_string()));
            for name in schema.field_names() {
                assert!(
                    columns.iter().any(|c| c == name),
                    "{} missing {}",
                    schema.entity.table(),
                    name
                );
            }
        }
    }

    #[test]
    fn test_kb_chunks_table_exists() {
        let db = Database::new_in_memory().unwrap();
        let columns = table_columns(&db, "kb_chunks");
        assert!(columns.contains(&"embedding".to_string()));
        assert!(columns.contains(&"header".to_string()));
    }

    #[test]
    fn test_open_file_database_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.db");
        {
            let db = Database::open(&path).unwrap();
            assert!(db.is_healthy());
        }
        // Schema creation is idempotent
        let db = Database::open(&path).unwrap();
        assert!(db.is_healthy());
    }
}
