//! libSQL storage layer for drug regulatory decisions.
//!
//! The [`Storage`] struct wraps a local libSQL database holding scraped
//! [`DrugEvent`]s and the history of ingestion runs.
//!
//! **Uniqueness:** `(event_type, drug_name, decision_number, publication_date)`
//! is enforced by a unique index. [`EventBatch::insert_event`] inserts
//! optimistically and reports a conflict as [`InsertOutcome::Duplicate`], so
//! two racing runs cannot both create the same record.

mod migrations;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use drugwatch_shared::{DataSource, DrugEvent, DrugwatchError, EventType, NewDrugEvent, Result};
use libsql::params::Params;
use libsql::{Connection, Database, Transaction, TransactionBehavior, Value, params};
use serde::Serialize;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How long a writer waits for another connection's lock before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const EVENT_COLUMNS: &str = "id, event_type, source, publication_date, decision_number, drug_name, \
     drug_strength, marketing_authorisation_holder, batch_number, expiry_date, created_at";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DrugwatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode (for the read API).
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DrugwatchError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(DrugwatchError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Event writes
    // -----------------------------------------------------------------------

    /// Open the transaction that all creations of one ingestion run share.
    ///
    /// The write lock is taken up front, so a second concurrent run waits
    /// (up to [`BUSY_TIMEOUT`]) for the first to commit instead of failing
    /// record by record.
    pub async fn begin_batch(&self) -> Result<EventBatch> {
        self.check_writable()?;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(storage_err)?;
        Ok(EventBatch { tx })
    }

    // -----------------------------------------------------------------------
    // Event queries
    // -----------------------------------------------------------------------

    /// Get a single event by id.
    pub async fn get_event(&self, id: i64) -> Result<Option<DrugEvent>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM drug_events WHERE id = ?1");
        let mut rows = self
            .conn
            .query(&sql, params![id])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_event(&row)?)),
            None => Ok(None),
        }
    }

    /// List events matching `filter`, newest publication date first.
    pub async fn list_events(&self, filter: &EventFilter) -> Result<Vec<DrugEvent>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if !filter.event_types.is_empty() {
            let placeholders: Vec<String> = filter
                .event_types
                .iter()
                .map(|t| {
                    values.push(Value::Text(t.as_str().to_string()));
                    format!("?{}", values.len())
                })
                .collect();
            clauses.push(format!("event_type IN ({})", placeholders.join(", ")));
        }

        if let Some(source) = filter.source {
            values.push(Value::Text(source.as_str().to_string()));
            clauses.push(format!("source = ?{}", values.len()));
        }

        if let Some(since) = filter.published_since {
            values.push(Value::Text(since.format(DATE_FORMAT).to_string()));
            clauses.push(format!("publication_date >= ?{}", values.len()));
        }

        let mut sql = format!("SELECT {EVENT_COLUMNS} FROM drug_events");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY publication_date DESC, id DESC");
        if let Some(limit) = filter.limit {
            values.push(Value::Integer(i64::from(limit)));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
        }

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(values))
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            results.push(row_to_event(&row)?);
        }
        Ok(results)
    }

    /// Count stored events, optionally for one source only.
    pub async fn count_events(&self, source: Option<DataSource>) -> Result<usize> {
        let mut rows = match source {
            Some(source) => self
                .conn
                .query(
                    "SELECT COUNT(*) FROM drug_events WHERE source = ?1",
                    params![source.as_str()],
                )
                .await
                .map_err(storage_err)?,
            None => self
                .conn
                .query("SELECT COUNT(*) FROM drug_events", params![])
                .await
                .map_err(storage_err)?,
        };

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)? as usize),
            None => Ok(0),
        }
    }

    /// Whether any event was created on `date` (UTC calendar day).
    pub async fn any_created_on(&self, date: NaiveDate) -> Result<bool> {
        let day = date.format(DATE_FORMAT).to_string();
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM drug_events WHERE substr(created_at, 1, 10) = ?1)",
                params![day],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)? != 0),
            None => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Scrape run operations
    // -----------------------------------------------------------------------

    /// Record the start of an ingestion run. Returns the generated run ID.
    pub async fn insert_scrape_run(
        &self,
        source: DataSource,
        started_at: DateTime<Utc>,
    ) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        self.conn
            .execute(
                "INSERT INTO scrape_runs (id, source, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), source.as_str(), format_instant(started_at)],
            )
            .await
            .map_err(storage_err)?;
        Ok(id)
    }

    /// Close an ingestion run with its outcome.
    pub async fn finish_scrape_run(
        &self,
        run_id: &str,
        finished_at: DateTime<Utc>,
        status: &str,
        content_hash: Option<&str>,
        stats: &serde_json::Value,
    ) -> Result<()> {
        self.check_writable()?;
        self.conn
            .execute(
                "UPDATE scrape_runs
                 SET finished_at = ?1, status = ?2, content_hash = ?3, stats_json = ?4
                 WHERE id = ?5",
                params![
                    format_instant(finished_at),
                    status,
                    content_hash,
                    stats.to_string(),
                    run_id
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Most recent ingestion runs, newest first.
    pub async fn list_scrape_runs(&self, limit: u32) -> Result<Vec<ScrapeRun>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, source, started_at, finished_at, status, content_hash, stats_json
                 FROM scrape_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
                params![i64::from(limit)],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let source: String = row.get(1).map_err(storage_err)?;
            let started_at: String = row.get(2).map_err(storage_err)?;
            results.push(ScrapeRun {
                id: row.get(0).map_err(storage_err)?,
                source: source.parse()?,
                started_at: parse_instant(&started_at)?,
                finished_at: match row.get::<String>(3).ok() {
                    Some(s) => Some(parse_instant(&s)?),
                    None => None,
                },
                status: row.get(4).map_err(storage_err)?,
                content_hash: row.get::<String>(5).ok(),
                stats: row
                    .get::<String>(6)
                    .ok()
                    .and_then(|s| serde_json::from_str(&s).ok()),
            });
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// EventBatch
// ---------------------------------------------------------------------------

/// Result of an optimistic insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was created with this id.
    Created(i64),
    /// A row with the same uniqueness key already exists.
    Duplicate,
}

/// The single transaction an ingestion run writes through.
///
/// Dropping a batch without calling [`EventBatch::commit`] rolls it back.
pub struct EventBatch {
    tx: Transaction,
}

impl EventBatch {
    /// Insert `event`, treating a uniqueness-key conflict as a duplicate.
    ///
    /// Any other constraint failure is returned as an error for this record
    /// only; the batch stays usable.
    pub async fn insert_event(
        &self,
        event: &NewDrugEvent,
        created_at: DateTime<Utc>,
    ) -> Result<InsertOutcome> {
        let changed = self
            .tx
            .execute(
                "INSERT INTO drug_events (
                    event_type, source, publication_date, decision_number, drug_name,
                    drug_strength, marketing_authorisation_holder, batch_number, expiry_date,
                    created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(event_type, drug_name, decision_number, publication_date)
                 DO NOTHING",
                params![
                    event.event_type.as_str(),
                    event.source.as_str(),
                    event.publication_date.format(DATE_FORMAT).to_string(),
                    event.decision_number.as_str(),
                    event.drug_name.as_str(),
                    event.drug_strength.as_str(),
                    event.marketing_authorisation_holder.as_str(),
                    event.batch_number.as_deref(),
                    event
                        .expiry_date
                        .map(|d| d.format(DATE_FORMAT).to_string()),
                    format_instant(created_at),
                ],
            )
            .await
            .map_err(storage_err)?;

        if changed == 0 {
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Created(self.tx.last_insert_rowid()))
        }
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(storage_err)
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await.map_err(storage_err)
    }
}

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

/// Filter for [`Storage::list_events`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Match any of these types.
    pub event_types: Vec<EventType>,
    pub source: Option<DataSource>,
    /// Inclusive lower bound on publication date.
    pub published_since: Option<NaiveDate>,
    pub limit: Option<u32>,
}

/// One row of ingestion history.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeRun {
    pub id: String,
    pub source: DataSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// `running`, `completed`, `completed_with_errors` or `failed`.
    pub status: String,
    /// SHA-256 of the fetched page, when the fetch succeeded.
    pub content_hash: Option<String>,
    pub stats: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

fn storage_err(e: libsql::Error) -> DrugwatchError {
    DrugwatchError::Storage(e.to_string())
}

/// Fixed-width UTC timestamp so `substr(created_at, 1, 10)` is the calendar day.
fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DrugwatchError::Storage(format!("invalid timestamp '{s}': {e}")))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|e| DrugwatchError::Storage(format!("invalid date '{s}': {e}")))
}

/// Convert a database row (selected with [`EVENT_COLUMNS`]) to a [`DrugEvent`].
fn row_to_event(row: &libsql::Row) -> Result<DrugEvent> {
    let event_type: String = row.get(1).map_err(storage_err)?;
    let source: String = row.get(2).map_err(storage_err)?;
    let publication_date: String = row.get(3).map_err(storage_err)?;
    let created_at: String = row.get(10).map_err(storage_err)?;

    Ok(DrugEvent {
        id: row.get::<i64>(0).map_err(storage_err)?,
        event_type: event_type
            .parse()
            .map_err(|e| DrugwatchError::Storage(format!("corrupt event_type: {e}")))?,
        source: source
            .parse()
            .map_err(|e| DrugwatchError::Storage(format!("corrupt source: {e}")))?,
        publication_date: parse_date(&publication_date)?,
        decision_number: row.get(4).map_err(storage_err)?,
        drug_name: row.get(5).map_err(storage_err)?,
        drug_strength: row.get(6).map_err(storage_err)?,
        marketing_authorisation_holder: row.get(7).map_err(storage_err)?,
        batch_number: row.get::<String>(8).ok(),
        expiry_date: match row.get::<String>(9).ok() {
            Some(s) => Some(parse_date(&s)?),
            None => None,
        },
        created_at: parse_instant(&created_at)?,
    })
}
