use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Document (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stored timestamp {0} is out of range")]
    InvalidTimestamp(i64),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Anything we can keep in the repositories table
///
/// The id is the platform's identifier and is always stored as a 64-bit
/// integer; GitHub ids have already outgrown 32 bits.
pub trait Document: Serialize + DeserializeOwned {
    fn document_id(&self) -> i64;
    fn full_name(&self) -> &str;
    fn default_branch(&self) -> &str;

    /// Receives the README columns when the document is read back.
    /// Documents that don't carry README fields can ignore it.
    fn attach_readme(&mut self, _readme: Option<String>, _read_at: Option<DateTime<Utc>>) {}
}

/// A document plus the bookkeeping the store adds around it
#[derive(Debug, Clone)]
pub struct StoredDocument<T> {
    pub document: T,
    pub ingested_at: DateTime<Utc>,
    pub readme: Option<String>,
    pub readme_read_at: Option<DateTime<Utc>>,
}

/// A stored repository whose README has not been looked at yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReadme {
    pub id: i64,
    pub full_name: String,
    pub default_branch: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
}

/// Document store on SQLite
///
/// One row per repository keyed by id. The document column holds the JSON
/// record exactly as the search produced it; README text lives in its own
/// columns so re-ingesting a repository never throws away a back-filled README.
pub struct RepositoryStore {
    conn: Connection,
}

impl RepositoryStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // Initialize schema on first run
        Self::init_schema(&conn)?;

        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS repositories (
                id INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL,
                default_branch TEXT NOT NULL,
                document TEXT NOT NULL,
                ingested_at INTEGER NOT NULL,
                readme TEXT,
                readme_read_at INTEGER
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_repositories_readme_pending
             ON repositories (readme_read_at)",
            [],
        )?;

        Ok(())
    }

    /// Insert-or-replace every document, keyed by id, in one transaction
    pub fn upsert_documents<'a, T, I>(
        &mut self,
        docs: I,
        ingested_at: DateTime<Utc>,
    ) -> Result<UpsertSummary>
    where
        T: Document + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let tx = self.conn.transaction()?;
        let mut summary = UpsertSummary::default();

        for doc in docs {
            let id = doc.document_id();
            let existed = tx
                .query_row("SELECT 1 FROM repositories WHERE id = ?1", [id], |_| Ok(()))
                .optional()?
                .is_some();

            let json = serde_json::to_string(doc)?;
            tx.execute(
                "INSERT INTO repositories (id, full_name, default_branch, document, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    full_name = excluded.full_name,
                    default_branch = excluded.default_branch,
                    document = excluded.document,
                    ingested_at = excluded.ingested_at",
                params![
                    id,
                    doc.full_name(),
                    doc.default_branch(),
                    json,
                    ingested_at.timestamp()
                ],
            )?;

            if existed {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
        }

        tx.commit()?;
        info!(
            "Upserted {} documents ({} new, {} updated)",
            summary.inserted + summary.updated,
            summary.inserted,
            summary.updated
        );
        Ok(summary)
    }

    /// Record the README for a repository. `None` marks it as checked but missing.
    ///
    /// Returns false when no repository with that id is stored.
    pub fn set_readme(&self, id: i64, readme: Option<&str>, read_at: DateTime<Utc>) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE repositories SET readme = ?2, readme_read_at = ?3 WHERE id = ?1",
            params![id, readme, read_at.timestamp()],
        )?;
        debug!("README stored for {}: {}", id, changed > 0);
        Ok(changed > 0)
    }

    /// The stored document with its README columns attached to it
    pub fn get<T: Document>(&self, id: i64) -> Result<Option<StoredDocument<T>>> {
        let row = self
            .conn
            .query_row(
                "SELECT document, ingested_at, readme, readme_read_at
                 FROM repositories WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((json, ingested_at, readme, readme_read_at)) = row else {
            return Ok(None);
        };

        let readme_read_at = readme_read_at.map(from_timestamp).transpose()?;
        let mut document: T = serde_json::from_str(&json)?;
        document.attach_readme(readme.clone(), readme_read_at);

        Ok(Some(StoredDocument {
            document,
            ingested_at: from_timestamp(ingested_at)?,
            readme,
            readme_read_at,
        }))
    }

    /// Repositories whose README has never been fetched, lowest id first
    pub fn pending_readmes(&self) -> Result<Vec<PendingReadme>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, full_name, default_branch FROM repositories
             WHERE readme_read_at IS NULL ORDER BY id",
        )?;

        let pending = stmt
            .query_map([], |row| {
                Ok(PendingReadme {
                    id: row.get(0)?,
                    full_name: row.get(1)?,
                    default_branch: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(pending)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(StoreError::InvalidTimestamp(secs))
}
