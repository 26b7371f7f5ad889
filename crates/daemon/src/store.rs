// Checkpoint store: one SQLite row per watched repository.
//
// `last_synced_at` advances only after a digest was delivered (or a
// window was verified empty), so the table is the single source of truth
// for "has this window been communicated". Writes for different repos are
// independent rows; writes for the same repo are serialized by the
// orchestrator.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use commitcast_common::types::{Checkpoint, RepoId};

const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE checkpoints (
    repo            TEXT PRIMARY KEY,
    last_synced_at  TEXT NOT NULL,
    last_commit_id  TEXT NULL
);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, MIGRATION_V1_SQL)];

#[derive(Debug)]
pub struct CheckpointStore {
    conn: Connection,
}

impl CheckpointStore {
    /// Open (creating if absent) the checkpoint database at `path`.
    ///
    /// Safe to call on every startup: migrations that already ran are
    /// skipped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create checkpoint db parent directory `{}`", parent.display())
            })?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("failed to open checkpoint db at `{}`", path.display()))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            ",
        )
        .context("failed to configure sqlite pragmas for checkpoint db")?;

        ensure_migration_table(&conn)?;
        apply_pending_migrations(&mut conn)?;

        Ok(Self { conn })
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn =
            Connection::open_in_memory().context("failed to open in-memory checkpoint db")?;
        ensure_migration_table(&conn)?;
        apply_pending_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Read the checkpoint for one repository. A missing row is `None`,
    /// never an error.
    pub fn get(&self, repo: &RepoId) -> Result<Option<Checkpoint>> {
        self.conn
            .query_row(
                "SELECT last_synced_at, last_commit_id FROM checkpoints WHERE repo = ?1",
                params![repo.to_string()],
                |row| {
                    let synced_at: String = row.get(0)?;
                    let last_commit_id: Option<String> = row.get(1)?;
                    Ok((synced_at, last_commit_id))
                },
            )
            .optional()
            .context("failed to read checkpoint row")?
            .map(|(synced_at, last_commit_id)| {
                let last_synced_at = synced_at
                    .parse::<DateTime<Utc>>()
                    .with_context(|| format!("corrupt last_synced_at for `{repo}`"))?;
                Ok(Checkpoint { repo: repo.clone(), last_synced_at, last_commit_id })
            })
            .transpose()
    }

    /// Upsert the checkpoint for one repository. Durable before returning.
    pub fn set(
        &self,
        repo: &RepoId,
        last_synced_at: DateTime<Utc>,
        last_commit_id: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO checkpoints (repo, last_synced_at, last_commit_id) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(repo) DO UPDATE SET \
                 last_synced_at = excluded.last_synced_at, \
                 last_commit_id = excluded.last_commit_id",
                params![repo.to_string(), last_synced_at.to_rfc3339(), last_commit_id],
            )
            .context("failed to write checkpoint row")?;
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i64> {
        current_schema_version(&self.conn)
    }
}

fn ensure_migration_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );
        ",
    )
    .context("failed to ensure schema_migrations table exists")
}

fn current_schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))
        .context("failed to read current schema version")
}

fn apply_pending_migrations(conn: &mut Connection) -> Result<()> {
    let current_version = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }

        let tx = conn.transaction().context("failed to start migration transaction")?;
        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply checkpoint db migration v{version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            params![version],
        )
        .with_context(|| format!("failed to record migration v{version}"))?;
        tx.commit().with_context(|| format!("failed to commit migration v{version}"))?;
    }

    Ok(())
}
