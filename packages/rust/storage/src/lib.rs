//! libSQL storage for the docset search index (`docSet.dsidx`).
//!
//! The [`SearchIndex`] struct wraps the single `searchIndex` table the
//! documentation browser queries by exact name.
//!
//! **Access rules:**
//! - Build pipeline: read-write via [`SearchIndex::create`]
//! - `lookup` command: read-only via [`SearchIndex::open_readonly`]

mod migrations;

use std::path::Path;

use libsql::{Connection, Database, params};
use poshdocset_shared::{DocsetError, EntryType, Result};

/// Result of one insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same name or the same path already exists.
    SkippedDuplicate,
    Failed(String),
}

/// One `searchIndex` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub id: i64,
    pub name: String,
    pub entry_type: EntryType,
    pub path: String,
}

/// Handle on a docset search index database.
pub struct SearchIndex {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> DocsetError {
    DocsetError::Storage(e.to_string())
}

impl SearchIndex {
    /// Create a fresh index at `path`, deleting any existing file first.
    pub async fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DocsetError::io(parent, e))?;
        }
        if path.exists() {
            tracing::debug!(?path, "removing previous search index");
            std::fs::remove_file(path).map_err(|e| DocsetError::io(path, e))?;
        }

        let index = Self::connect(path, false).await?;
        index.run_migrations().await?;
        Ok(index)
    }

    /// Open an existing index at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(DocsetError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "search index not found"),
            ));
        }
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self { db, conn, readonly })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::debug!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    DocsetError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// `PRAGMA user_version`, or 0 if it cannot be read.
    async fn get_schema_version(&self) -> u32 {
        match self.conn.query("PRAGMA user_version", params![]).await {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DocsetError::Storage(
                "search index is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    pub async fn begin(&self) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute("BEGIN", params![])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    pub async fn commit(&self) -> Result<()> {
        self.conn
            .execute("COMMIT", params![])
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Insert `(name, type, path)` unless a row already uses the name or the
    /// path. Never returns an error; failures come back as
    /// [`InsertOutcome::Failed`].
    pub async fn insert_unique(&self, name: &str, entry_type: EntryType, path: &str) -> InsertOutcome {
        match self.try_insert(name, entry_type, path).await {
            Ok(true) => InsertOutcome::Inserted,
            Ok(false) => InsertOutcome::SkippedDuplicate,
            Err(e) => InsertOutcome::Failed(e.to_string()),
        }
    }

    async fn try_insert(&self, name: &str, entry_type: EntryType, path: &str) -> Result<bool> {
        self.check_writable()?;

        let by_path = self.find_by_path(path).await?;
        let by_name = self.find_by_name(name).await?;
        if by_path.is_some() || by_name.is_some() {
            return Ok(false);
        }

        let affected = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO searchIndex(name, type, path) VALUES (?1, ?2, ?3)",
                params![name, entry_type.as_str(), path],
            )
            .await
            .map_err(storage_err)?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    async fn first_id(&self, sql: &str, value: &str) -> Result<Option<i64>> {
        let mut rows = self
            .conn
            .query(sql, params![value])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row.get::<i64>(0).map_err(storage_err)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Row id of the entry stored at `path`.
    pub async fn find_by_path(&self, path: &str) -> Result<Option<i64>> {
        self.first_id("SELECT rowid FROM searchIndex WHERE path = ?1", path)
            .await
    }

    /// Row id of the entry named `name`.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<i64>> {
        self.first_id("SELECT rowid FROM searchIndex WHERE name = ?1", name)
            .await
    }

    async fn collect_entries(&self, sql: &str, args: impl libsql::params::IntoParams) -> Result<Vec<IndexEntry>> {
        let mut rows = self.conn.query(sql, args).await.map_err(storage_err)?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let type_name = row.get::<String>(2).map_err(storage_err)?;
            entries.push(IndexEntry {
                id: row.get::<i64>(0).map_err(storage_err)?,
                name: row.get::<String>(1).map_err(storage_err)?,
                entry_type: type_name.parse().map_err(storage_err)?,
                path: row.get::<String>(3).map_err(storage_err)?,
            });
        }
        Ok(entries)
    }

    /// Exact-name lookup, as the documentation browser performs it.
    pub async fn lookup(&self, name: &str) -> Result<Vec<IndexEntry>> {
        self.collect_entries(
            "SELECT id, name, type, path FROM searchIndex WHERE name = ?1 ORDER BY id",
            params![name],
        )
        .await
    }

    /// Every row in insertion order.
    pub async fn entries(&self) -> Result<Vec<IndexEntry>> {
        self.collect_entries(
            "SELECT id, name, type, path FROM searchIndex ORDER BY id",
            params![],
        )
        .await
    }

    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM searchIndex", params![])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)? as usize),
            None => Ok(0),
        }
    }
}
