//! Once-per-day guard around the ingestion pipeline.
//!
//! Any record created on the current calendar day means today's ingestion
//! already happened; the guard then returns a skipped outcome without
//! touching the sources. Otherwise every registered source runs in turn and
//! a failing source does not stop the next one.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, instrument};

use drugwatch_scraper::SourceRegistry;
use drugwatch_shared::{DataSource, Result, ScrapeResult};
use drugwatch_storage::Storage;

use crate::ingest::{IngestContext, ProgressReporter, ingest_source};

/// Whether today's ingestion already produced records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    NotRunToday,
    RunToday,
}

impl GuardState {
    pub async fn check(storage: &Storage, today: NaiveDate) -> Result<Self> {
        if storage.any_created_on(today).await? {
            Ok(Self::RunToday)
        } else {
            Ok(Self::NotRunToday)
        }
    }
}

/// Result of one daily trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DailyOutcome {
    Skipped { message: String, date: NaiveDate },
    Completed(DailyReport),
}

/// Per-source results of a daily run that was not skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub sources: Vec<SourceReport>,
    pub total_new_records: usize,
    pub total_duplicates: usize,
}

/// What happened to one source: a result, or the error that stopped it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ScrapeResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// Run every registered source unless records were already created today.
#[instrument(skip_all, fields(sources = registry.len()))]
pub async fn run_daily(
    ctx: &IngestContext<'_>,
    registry: &SourceRegistry,
    progress: &dyn ProgressReporter,
) -> Result<DailyOutcome> {
    let today = ctx.clock.today();

    progress.phase("Checking today's ingestion");
    if GuardState::check(ctx.storage, today).await? == GuardState::RunToday {
        info!(%today, "ingestion already ran today, skipping");
        return Ok(DailyOutcome::Skipped {
            message: format!("Scraping already completed today ({today})"),
            date: today,
        });
    }

    info!(%today, "no records created today, running sources");

    let mut sources = Vec::with_capacity(registry.len());
    let mut totals = ScrapeResult::default();

    for adapter in registry.adapters() {
        let source = adapter.source();
        match ingest_source(ctx, adapter, progress).await {
            Ok(result) => {
                totals.absorb(&result);
                sources.push(SourceReport {
                    source,
                    result: Some(result),
                    error: None,
                });
            }
            Err(e) => {
                error!(%source, error = %e, "source failed");
                sources.push(SourceReport {
                    source,
                    result: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    info!(
        total_new_records = totals.new_records,
        total_duplicates = totals.duplicates_skipped,
        "daily ingestion completed"
    );

    Ok(DailyOutcome::Completed(DailyReport {
        date: today,
        sources,
        total_new_records: totals.new_records,
        total_duplicates: totals.duplicates_skipped,
    }))
}
