//! Ingestion pipeline, daily guard, and request handlers for drugwatch.
//!
//! This crate ties together fetching, extraction, normalization, and
//! storage into end-to-end workflows:
//! - [`ingest`]: one source from page to stored records
//! - [`guard`]: the once-per-day wrapper over every source
//! - [`api`]: read and trigger handlers returning JSON bodies
//! - [`schedule`]: the cron-driven daily job

pub mod api;
pub mod guard;
pub mod ingest;
pub mod schedule;
pub mod window;

#[cfg(test)]
mod test_support;

pub use api::{ApiResponse, ListQuery, event_detail, list_events, recent_withdrawals, trigger_scrape};
pub use guard::{DailyOutcome, DailyReport, GuardState, SourceReport, run_daily};
pub use ingest::{
    IngestContext, Prepared, ProgressReporter, SilentProgress, ingest_source, persist_events,
    prepare_candidates,
};
pub use schedule::{DailyJob, build_scheduler, run_scheduler};
pub use window::LookbackWindow;
