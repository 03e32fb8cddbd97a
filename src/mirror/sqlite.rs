use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use super::{MirrorError, MirrorStore};

/// SQLite-backed mirror store. One row per key in `mirror_entries`.
pub struct SqliteMirrorStore {
    conn: Connection,
}

impl SqliteMirrorStore {
    /// Open (or create) the mirror database at `path` and run migrations.
    /// Parent directories are created when missing.
    pub fn open(path: &Path) -> Result<Self, MirrorError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self, MirrorError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, MirrorError> {
        configure_pragmas(&conn)?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }
}

impl MirrorStore for SqliteMirrorStore {
    fn read(&self, key: &str) -> Result<Option<String>, MirrorError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM mirror_entries WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), MirrorError> {
        self.conn.execute(
            "INSERT INTO mirror_entries (key, value, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), MirrorError> {
        self.conn
            .execute("DELETE FROM mirror_entries WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn configure_pragmas(conn: &Connection) -> Result<(), MirrorError> {
    conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
    Ok(())
}

/// Run all pending migrations
fn run_migrations(conn: &Connection) -> Result<(), MirrorError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![(
        1,
        include_str!("../../resources/migrations/001_mirror.sql"),
    )];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running mirror migration v{version}");
            conn.execute_batch(sql).map_err(|e| MirrorError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}
