use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

pub const SCHEMA_VERSION: i64 = 1;

/// Creates the schema and stamps its version. Everything happens in one
/// transaction, so a failure leaves the connection in autocommit mode with
/// nothing applied.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS components (
            uuid TEXT PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            project_key TEXT NOT NULL,
            path TEXT,
            name TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_components_project ON components(project_key);

        CREATE TABLE IF NOT EXISTS source_lines (
            file_uuid TEXT NOT NULL,
            line INTEGER NOT NULL,
            source TEXT NOT NULL,
            highlighting TEXT,
            symbols TEXT,
            scm_author TEXT,
            scm_revision TEXT,
            scm_date INTEGER,
            line_hits INTEGER NOT NULL DEFAULT 0,
            conditions INTEGER NOT NULL DEFAULT 0,
            covered_conditions INTEGER NOT NULL DEFAULT 0,
            duplications TEXT,
            PRIMARY KEY(file_uuid, line),
            FOREIGN KEY(file_uuid) REFERENCES components(uuid) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS grants (
            id INTEGER PRIMARY KEY,
            login TEXT,
            permission TEXT NOT NULL,
            project_key TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_grants_project ON grants(project_key, permission);
        ",
    )?;

    let current: Option<String> = tx
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let current = current.and_then(|value| value.parse::<i64>().ok());
    if let Some(version) = current {
        if version > SCHEMA_VERSION {
            anyhow::bail!(
                "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
            );
        }
    }
    if current != Some(SCHEMA_VERSION) {
        tx.execute(
            "INSERT INTO meta(key, value) VALUES('schema_version', ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![SCHEMA_VERSION.to_string()],
        )?;
    }
    tx.commit()?;
    Ok(())
}
