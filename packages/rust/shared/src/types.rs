//! Core domain types for drug regulatory decisions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DrugwatchError;

/// Length of the trailing lookback window, in calendar days.
pub const LOOKBACK_DAYS: i64 = 10;

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// Kind of regulatory action a decision represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Withdrawal,
    Suspension,
    Registration,
}

impl EventType {
    /// Stable storage / wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Withdrawal => "WITHDRAWAL",
            Self::Suspension => "SUSPENSION",
            Self::Registration => "REGISTRATION",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DrugwatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WITHDRAWAL" => Ok(Self::Withdrawal),
            "SUSPENSION" => Ok(Self::Suspension),
            "REGISTRATION" => Ok(Self::Registration),
            _ => Err(DrugwatchError::validation(format!(
                "unknown event type '{s}': expected WITHDRAWAL, SUSPENSION or REGISTRATION"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// DataSource
// ---------------------------------------------------------------------------

/// Upstream feed a record was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSource {
    /// Chief Pharmaceutical Inspectorate (GIF) decisions register.
    Gif,
    /// Office for Registration of Medicinal Products (URPL).
    Urpl,
}

impl DataSource {
    /// Every known source, in the order the daily run visits them.
    pub const ALL: [DataSource; 2] = [DataSource::Gif, DataSource::Urpl];

    /// Stable storage / wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gif => "GIF",
            Self::Urpl => "URPL",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = DrugwatchError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GIF" => Ok(Self::Gif),
            "URPL" => Ok(Self::Urpl),
            _ => Err(DrugwatchError::validation(format!(
                "unknown source '{s}': expected GIF or URPL"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// DrugEvent
// ---------------------------------------------------------------------------

/// A persisted regulatory decision.
///
/// `(event_type, drug_name, decision_number, publication_date)` is the
/// uniqueness key; the storage layer enforces it with a unique index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugEvent {
    /// Storage-assigned row id.
    pub id: i64,
    pub event_type: EventType,
    pub source: DataSource,
    /// Date the decision was issued.
    pub publication_date: NaiveDate,
    /// Identifier issued by the source.
    pub decision_number: String,
    pub drug_name: String,
    pub drug_strength: String,
    pub marketing_authorisation_holder: String,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    /// Ingestion timestamp; set once at creation.
    pub created_at: DateTime<Utc>,
}

/// A normalized candidate record, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDrugEvent {
    pub event_type: EventType,
    pub source: DataSource,
    pub publication_date: NaiveDate,
    pub decision_number: String,
    pub drug_name: String,
    pub drug_strength: String,
    pub marketing_authorisation_holder: String,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// ScrapeResult
// ---------------------------------------------------------------------------

/// Summary of one source's ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeResult {
    /// Records created by this run.
    pub new_records: usize,
    /// Candidates that matched an existing record's uniqueness key.
    pub duplicates_skipped: usize,
    /// Rows dropped because their decision date could not be parsed.
    #[serde(default)]
    pub skipped_rows: usize,
    /// Per-record failures; never abort the run.
    pub errors: Vec<String>,
}

impl ScrapeResult {
    /// Fold another source's result into this one.
    pub fn absorb(&mut self, other: &ScrapeResult) {
        self.new_records += other.new_records;
        self.duplicates_skipped += other.duplicates_skipped;
        self.skipped_rows += other.skipped_rows;
        self.errors.extend(other.errors.iter().cloned());
    }
}
