//! SQL migration definitions for the drugwatch database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: drug_events with uniqueness key, scrape_runs",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Regulatory decisions. Length limits follow the upstream model's field sizes.
CREATE TABLE IF NOT EXISTS drug_events (
    id                             INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type                     TEXT NOT NULL
        CHECK (event_type IN ('WITHDRAWAL', 'SUSPENSION', 'REGISTRATION')),
    source                         TEXT NOT NULL CHECK (source IN ('GIF', 'URPL')),
    publication_date               TEXT NOT NULL,
    decision_number                TEXT NOT NULL CHECK (length(decision_number) <= 100),
    drug_name                      TEXT NOT NULL CHECK (length(drug_name) <= 255),
    drug_strength                  TEXT NOT NULL DEFAULT ''
        CHECK (length(drug_strength) <= 255),
    marketing_authorisation_holder TEXT NOT NULL DEFAULT ''
        CHECK (length(marketing_authorisation_holder) <= 255),
    batch_number                   TEXT,
    expiry_date                    TEXT,
    created_at                     TEXT NOT NULL,
    UNIQUE(event_type, drug_name, decision_number, publication_date)
);

CREATE INDEX IF NOT EXISTS idx_drug_events_publication_date ON drug_events(publication_date);
CREATE INDEX IF NOT EXISTS idx_drug_events_created_at ON drug_events(created_at);

CREATE TRIGGER IF NOT EXISTS drug_events_created_at_immutable
BEFORE UPDATE OF created_at ON drug_events
WHEN new.created_at IS NOT old.created_at
BEGIN
    SELECT RAISE(ABORT, 'created_at is immutable');
END;

-- Ingestion run history
CREATE TABLE IF NOT EXISTS scrape_runs (
    id           TEXT PRIMARY KEY,
    source       TEXT NOT NULL,
    started_at   TEXT NOT NULL,
    finished_at  TEXT,
    status       TEXT NOT NULL DEFAULT 'running',
    content_hash TEXT,
    stats_json   TEXT
);

CREATE INDEX IF NOT EXISTS idx_scrape_runs_started_at ON scrape_runs(started_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
