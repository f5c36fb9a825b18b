//! Daily scheduler: a cron job that fires the guarded ingestion run.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, instrument};

use drugwatch_scraper::{HttpFetcher, SourceRegistry};
use drugwatch_shared::{Clock, DrugwatchError, Result, ScheduleConfig};
use drugwatch_storage::Storage;

use crate::guard::{DailyOutcome, run_daily};
use crate::ingest::{IngestContext, ProgressReporter, SilentProgress};

/// Owned state for running the daily guard from a background job.
pub struct DailyJob {
    pub registry: SourceRegistry,
    pub fetcher: HttpFetcher,
    pub storage: Storage,
    pub clock: Arc<dyn Clock>,
    pub lookback_days: i64,
}

impl DailyJob {
    pub fn context(&self) -> IngestContext<'_> {
        IngestContext {
            fetcher: &self.fetcher,
            storage: &self.storage,
            clock: self.clock.as_ref(),
            lookback_days: self.lookback_days,
        }
    }

    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<DailyOutcome> {
        run_daily(&self.context(), &self.registry, progress).await
    }
}

fn schedule_err(e: JobSchedulerError) -> DrugwatchError {
    DrugwatchError::Schedule(e.to_string())
}

fn log_outcome(outcome: &Result<DailyOutcome>) {
    match outcome {
        Ok(DailyOutcome::Skipped { date, .. }) => info!(%date, "daily run skipped"),
        Ok(DailyOutcome::Completed(report)) => info!(
            date = %report.date,
            total_new_records = report.total_new_records,
            total_duplicates = report.total_duplicates,
            failed_sources = report.sources.iter().filter(|s| s.is_failure()).count(),
            "daily run completed"
        ),
        Err(e) => error!(error = %e, "daily run failed"),
    }
}

/// Build a scheduler with one job firing `job` at `cron` (local time).
pub async fn build_scheduler(job: Arc<DailyJob>, cron: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await.map_err(schedule_err)?;

    let cron_job = Job::new_async_tz(cron, chrono::Local, move |_uuid, _lock| {
        let job = Arc::clone(&job);
        Box::pin(async move {
            info!("scheduled daily run triggered");
            let outcome = job.run(&SilentProgress).await;
            log_outcome(&outcome);
        })
    })
    .map_err(|e| DrugwatchError::Schedule(format!("invalid cron expression '{cron}': {e}")))?;

    scheduler.add(cron_job).await.map_err(schedule_err)?;
    Ok(scheduler)
}

/// Run the startup check, then the daily scheduler until Ctrl-C.
#[instrument(skip_all, fields(cron = %config.cron))]
pub async fn run_scheduler(job: Arc<DailyJob>, config: &ScheduleConfig) -> Result<()> {
    if config.run_on_startup {
        info!("running startup check");
        log_outcome(&job.run(&SilentProgress).await);
    }

    let mut scheduler = build_scheduler(Arc::clone(&job), &config.cron).await?;
    scheduler.start().await.map_err(schedule_err)?;
    info!("scheduler started, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| DrugwatchError::Schedule(format!("failed to listen for Ctrl-C: {e}")))?;

    info!("shutting down scheduler");
    scheduler.shutdown().await.map_err(schedule_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::NaiveDate;
    use drugwatch_scraper::SourceAdapter;
    use drugwatch_shared::FixedClock;

    async fn daily_job(registry: SourceRegistry) -> Arc<DailyJob> {
        let clock = FixedClock::at_date(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        Arc::new(DailyJob {
            registry,
            fetcher: test_fetcher(),
            storage: temp_storage().await,
            clock: Arc::new(clock),
            lookback_days: 10,
        })
    }

    #[tokio::test]
    async fn job_runs_the_guard() {
        let server = serve_fixture("/", "gif_decisions.html").await;
        let adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(gif_adapter(&server))];
        let job = daily_job(SourceRegistry::new(adapters)).await;

        let first = job.run(&SilentProgress).await.unwrap();
        assert!(matches!(first, DailyOutcome::Completed(ref r) if r.total_new_records == 6));

        let second = job.run(&SilentProgress).await.unwrap();
        assert!(matches!(second, DailyOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn accepts_six_field_cron() {
        let job = daily_job(SourceRegistry::new(Vec::new())).await;
        assert!(build_scheduler(job, "0 0 6 * * *").await.is_ok());
    }

    #[tokio::test]
    async fn rejects_invalid_cron() {
        let job = daily_job(SourceRegistry::new(Vec::new())).await;
        let Err(err) = build_scheduler(job, "every morning").await else {
            panic!("expected invalid cron to be rejected");
        };
        assert!(matches!(err, DrugwatchError::Schedule(_)));
        assert!(err.to_string().contains("invalid cron expression"));
    }
}
