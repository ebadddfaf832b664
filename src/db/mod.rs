use crate::config::Config;
use crate::import::{Dataset, ImportCounts};
use crate::model::{Capability, Component, LineRecord};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

mod migrations;

pub use migrations::SCHEMA_VERSION;

const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA foreign_keys = ON;
";

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(PRAGMAS)?;
        Ok(())
    }

    fn on_release(&self, _conn: Connection) {}
}

pub struct Db {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool<SqliteConnectionManager>,
}

impl Db {
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory {}", parent.display()))?;
        }

        let config = Config::get();
        log::info!(
            "Initializing connection pool (size: {}, min_idle: {})",
            config.pool_size,
            config.pool_min_idle
        );

        // Migrations run on the write connection before any reader opens.
        let mut write_conn = Connection::open(db_path)
            .with_context(|| format!("open sqlite db at {}", db_path.display()))?;
        write_conn.busy_timeout(Duration::from_secs(30))?;
        write_conn.execute_batch(PRAGMAS)?;
        migrations::migrate(&mut write_conn)?;
        let write_conn = Arc::new(Mutex::new(write_conn));

        let manager = SqliteConnectionManager::file(db_path);
        let read_pool = Pool::builder()
            .max_size(config.pool_size)
            .min_idle(Some(config.pool_min_idle))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .with_context(|| "create connection pool")?;

        log::info!("Database connection pool initialized");

        Ok(Self {
            write_conn,
            read_pool,
        })
    }

    pub fn read_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.read_pool
            .get()
            .with_context(|| "get read connection from pool")
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.write_conn
            .lock()
            .map_err(|_| anyhow::anyhow!("write connection mutex poisoned"))
    }

    pub fn get_component_by_uuid(&self, uuid: &str) -> Result<Option<Component>> {
        let conn = self.read_conn()?;
        conn.query_row(
            "SELECT uuid, key, project_key, path, name FROM components WHERE uuid = ?",
            params![uuid],
            component_from_row,
        )
        .optional()
        .with_context(|| format!("lookup component {uuid}"))
    }

    /// Lines of a file whose number lies in `[from, to]`, ascending.
    pub fn lines_for_file(&self, file_uuid: &str, from: i64, to: i64) -> Result<Vec<LineRecord>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT file_uuid, line, source, highlighting, symbols, scm_author, scm_revision,
                    scm_date, line_hits, conditions, covered_conditions, duplications
             FROM source_lines
             WHERE file_uuid = ? AND line >= ? AND line <= ?
             ORDER BY line",
        )?;
        let rows = stmt.query_map(params![file_uuid, from, to], line_from_row)?;
        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?);
        }
        Ok(lines)
    }

    /// True when `login` (or anyone, for a `NULL` login grant) holds `permission`
    /// on the project that owns `component_key`.
    pub fn has_project_permission(
        &self,
        login: Option<&str>,
        permission: Capability,
        component_key: &str,
    ) -> Result<bool> {
        let conn = self.read_conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1
                 FROM grants g
                 JOIN components c ON c.project_key = g.project_key
                 WHERE c.key = ?1
                   AND g.permission = ?2
                   AND (g.login IS NULL OR g.login = ?3)
                 LIMIT 1",
                params![component_key, permission.as_str(), login],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Loads a dataset in a single transaction. Lines of every file named in
    /// `dataset.lines` are replaced, not merged.
    pub fn import(&mut self, dataset: &Dataset) -> Result<ImportCounts> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut counts = ImportCounts::default();

        {
            let mut upsert = tx.prepare(
                "INSERT INTO components(uuid, key, project_key, path, name)
                 VALUES(?, ?, ?, ?, ?)
                 ON CONFLICT(uuid) DO UPDATE SET
                    key = excluded.key,
                    project_key = excluded.project_key,
                    path = excluded.path,
                    name = excluded.name",
            )?;
            for component in &dataset.components {
                upsert.execute(params![
                    component.uuid,
                    component.key,
                    component.project_key,
                    component.path,
                    component.name,
                ])?;
                counts.components += 1;
            }
        }

        {
            let mut exists = tx.prepare(
                "SELECT 1 FROM grants
                 WHERE login IS ? AND permission = ? AND project_key = ?",
            )?;
            let mut insert =
                tx.prepare("INSERT INTO grants(login, permission, project_key) VALUES(?, ?, ?)")?;
            for grant in &dataset.grants {
                let permission = grant.permission.as_str();
                let present = exists
                    .query_row(
                        params![grant.login, permission, grant.project_key],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if !present {
                    insert.execute(params![grant.login, permission, grant.project_key])?;
                    counts.grants += 1;
                }
            }
        }

        {
            let mut known = tx.prepare("SELECT 1 FROM components WHERE uuid = ?")?;
            let mut clear = tx.prepare("DELETE FROM source_lines WHERE file_uuid = ?")?;
            let mut insert = tx.prepare(
                "INSERT INTO source_lines(
                    file_uuid, line, source, highlighting, symbols, scm_author, scm_revision,
                    scm_date, line_hits, conditions, covered_conditions, duplications)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            let mut cleared = std::collections::HashSet::new();
            for line in &dataset.lines {
                if cleared.insert(line.file_uuid.as_str()) {
                    let present = known
                        .query_row(params![line.file_uuid], |_| Ok(()))
                        .optional()?
                        .is_some();
                    if !present {
                        anyhow::bail!(
                            "line {} refers to unknown component '{}'",
                            line.line,
                            line.file_uuid
                        );
                    }
                    clear.execute(params![line.file_uuid])?;
                    counts.files += 1;
                }
                let duplications = if line.duplications.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&line.duplications)?)
                };
                insert
                    .execute(params![
                        line.file_uuid,
                        line.line,
                        line.source,
                        line.highlighting,
                        line.symbols,
                        line.scm_author,
                        line.scm_revision,
                        line.scm_date.map(|date| date.timestamp_millis()),
                        line.line_hits,
                        line.conditions,
                        line.covered_conditions,
                        duplications,
                    ])
                    .with_context(|| format!("insert line {} of {}", line.line, line.file_uuid))?;
                counts.lines += 1;
            }
        }

        tx.commit()?;
        Ok(counts)
    }
}

fn component_from_row(row: &Row<'_>) -> rusqlite::Result<Component> {
    Ok(Component {
        uuid: row.get(0)?,
        key: row.get(1)?,
        project_key: row.get(2)?,
        path: row.get(3)?,
        name: row.get(4)?,
    })
}

fn line_from_row(row: &Row<'_>) -> rusqlite::Result<LineRecord> {
    let scm_date: Option<i64> = row.get(7)?;
    let duplications: Option<String> = row.get(11)?;
    let duplications = match duplications {
        Some(raw) => serde_json::from_str(&raw).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(err))
        })?,
        None => Vec::new(),
    };
    Ok(LineRecord {
        file_uuid: row.get(0)?,
        line: row.get(1)?,
        source: row.get(2)?,
        highlighting: row.get(3)?,
        symbols: row.get(4)?,
        scm_author: row.get(5)?,
        scm_revision: row.get(6)?,
        scm_date: scm_date.and_then(DateTime::<Utc>::from_timestamp_millis),
        line_hits: row.get(8)?,
        conditions: row.get(9)?,
        covered_conditions: row.get(10)?,
        duplications,
    })
}
