//! Per-source ingestion pipeline: fetch → extract → window → normalize → persist.

use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use drugwatch_scraper::{
    HttpFetcher, RawRow, SourceAdapter, decode_entities, extract_rows, is_placeholder_name,
    map_decision_type, parse_decision_date,
};
use drugwatch_shared::{Clock, DataSource, DrugwatchError, NewDrugEvent, Result, ScrapeResult};
use drugwatch_storage::{InsertOutcome, Storage};

use crate::window::LookbackWindow;

/// Scrape run status values recorded in `scrape_runs`.
pub const RUN_COMPLETED: &str = "completed";
pub const RUN_COMPLETED_WITH_ERRORS: &str = "completed_with_errors";
pub const RUN_FAILED: &str = "failed";

/// Everything an ingestion run needs besides the source itself.
#[derive(Clone, Copy)]
pub struct IngestContext<'a> {
    pub fetcher: &'a HttpFetcher,
    pub storage: &'a Storage,
    pub clock: &'a dyn Clock,
    /// Length of the trailing window, in days.
    pub lookback_days: i64,
}

/// Progress callback for reporting ingestion status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a source finished ingesting.
    fn source_done(&self, source: DataSource, result: &ScrapeResult);
    /// Called when a source failed as a whole.
    fn source_failed(&self, source: DataSource, error: &DrugwatchError);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_done(&self, _source: DataSource, _result: &ScrapeResult) {}
    fn source_failed(&self, _source: DataSource, _error: &DrugwatchError) {}
}

// ---------------------------------------------------------------------------
// Candidate preparation
// ---------------------------------------------------------------------------

/// Candidates produced from one page of raw rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prepared {
    pub candidates: Vec<NewDrugEvent>,
    /// Rows dropped because their decision date did not parse.
    pub skipped_rows: usize,
    /// Rows dated before the window cutoff.
    pub out_of_window: usize,
}

/// Turn raw rows into normalized, in-window candidates.
///
/// Placeholder drug names (`""`, `"-"`) are dropped before entity decoding.
pub fn prepare_candidates(
    rows: &[RawRow],
    source: DataSource,
    window: &LookbackWindow,
) -> Prepared {
    let mut prepared = Prepared::default();

    for row in rows {
        let Some(published) = parse_decision_date(&row.decision_date) else {
            warn!(
                date = %row.decision_date,
                decision_number = %row.decision_number,
                "could not parse decision date, skipping row"
            );
            prepared.skipped_rows += 1;
            continue;
        };

        if !window.contains(published) {
            debug!(%published, cutoff = %window.cutoff(), "decision outside window");
            prepared.out_of_window += 1;
            continue;
        }

        let names = row.drug_names.len();
        if [&row.strengths, &row.holders, &row.decision_types]
            .iter()
            .any(|values| values.len() != names)
        {
            debug!(
                decision_number = %row.decision_number,
                names,
                strengths = row.strengths.len(),
                holders = row.holders.len(),
                decision_types = row.decision_types.len(),
                "multi-value cells differ in length, pairing by position"
            );
        }

        for entry in row.entries() {
            if is_placeholder_name(&entry.drug_name) {
                debug!(decision_number = %row.decision_number, "skipping placeholder drug name");
                continue;
            }

            prepared.candidates.push(NewDrugEvent {
                event_type: map_decision_type(&decode_entities(&entry.decision_type)),
                source,
                publication_date: published,
                decision_number: row.decision_number.clone(),
                drug_name: decode_entities(&entry.drug_name),
                drug_strength: decode_entities(&entry.strength),
                marketing_authorisation_holder: decode_entities(&entry.holder),
                batch_number: None,
                expiry_date: None,
            });
        }
    }

    prepared
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Insert every candidate inside one transaction.
///
/// Duplicates are counted, per-record failures are collected into
/// `errors`, and only a failure to open or commit the batch aborts.
#[instrument(skip_all, fields(candidates = candidates.len()))]
pub async fn persist_events(
    storage: &Storage,
    candidates: &[NewDrugEvent],
    clock: &dyn Clock,
) -> Result<ScrapeResult> {
    let created_at = clock.now();
    let batch = storage.begin_batch().await?;
    let mut result = ScrapeResult::default();

    for candidate in candidates {
        match batch.insert_event(candidate, created_at).await {
            Ok(InsertOutcome::Created(id)) => {
                result.new_records += 1;
                debug!(id, drug = %candidate.drug_name, event_type = %candidate.event_type, "created record");
            }
            Ok(InsertOutcome::Duplicate) => {
                result.duplicates_skipped += 1;
                debug!(drug = %candidate.drug_name, event_type = %candidate.event_type, "skipping duplicate");
            }
            Err(e) => {
                let message = format!("Error creating record for {}: {e}", candidate.drug_name);
                warn!("{message}");
                result.errors.push(message);
            }
        }
    }

    batch.commit().await?;
    Ok(result)
}

// ---------------------------------------------------------------------------
// Source pipeline
// ---------------------------------------------------------------------------

/// Run the whole pipeline for one source and record it in `scrape_runs`.
///
/// Fetch and extraction failures are fatal for the source and returned as
/// errors; row-level problems end up in the [`ScrapeResult`].
#[instrument(skip_all, fields(source = %adapter.source(), url = %adapter.url()))]
pub async fn ingest_source(
    ctx: &IngestContext<'_>,
    adapter: &dyn SourceAdapter,
    progress: &dyn ProgressReporter,
) -> Result<ScrapeResult> {
    let start = Instant::now();
    let source = adapter.source();
    let run_id = ctx
        .storage
        .insert_scrape_run(source, ctx.clock.now())
        .await?;

    info!(%run_id, "starting ingestion");

    match run_pipeline(ctx, adapter, progress).await {
        Ok((result, content_hash)) => {
            let status = if result.errors.is_empty() {
                RUN_COMPLETED
            } else {
                RUN_COMPLETED_WITH_ERRORS
            };
            let stats = serde_json::to_value(&result).unwrap_or_default();
            ctx.storage
                .finish_scrape_run(&run_id, ctx.clock.now(), status, Some(&content_hash), &stats)
                .await?;

            info!(
                new_records = result.new_records,
                duplicates_skipped = result.duplicates_skipped,
                skipped_rows = result.skipped_rows,
                errors = result.errors.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "ingestion completed"
            );
            progress.source_done(source, &result);
            Ok(result)
        }
        Err(e) => {
            error!(error = %e, "ingestion failed");
            let stats = serde_json::json!({ "error": e.to_string() });
            if let Err(record_err) = ctx
                .storage
                .finish_scrape_run(&run_id, ctx.clock.now(), RUN_FAILED, None, &stats)
                .await
            {
                warn!(error = %record_err, "could not record failed run");
            }
            progress.source_failed(source, &e);
            Err(e)
        }
    }
}

async fn run_pipeline(
    ctx: &IngestContext<'_>,
    adapter: &dyn SourceAdapter,
    progress: &dyn ProgressReporter,
) -> Result<(ScrapeResult, String)> {
    // The window is fixed for the whole run.
    let window = LookbackWindow::from_clock(ctx.clock, ctx.lookback_days);

    progress.phase(&format!("Fetching {}", adapter.source()));
    let page = ctx.fetcher.fetch(adapter.url()).await?;

    progress.phase(&format!("Extracting {} decisions", adapter.source()));
    let rows = extract_rows(&page.body, adapter)?;
    let prepared = prepare_candidates(&rows, adapter.source(), &window);
    debug!(
        rows = rows.len(),
        candidates = prepared.candidates.len(),
        skipped_rows = prepared.skipped_rows,
        out_of_window = prepared.out_of_window,
        cutoff = %window.cutoff(),
        "prepared candidates"
    );

    progress.phase(&format!("Saving {} records", adapter.source()));
    let mut result = persist_events(ctx.storage, &prepared.candidates, ctx.clock).await?;
    result.skipped_rows = prepared.skipped_rows;

    Ok((result, page.content_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use chrono::NaiveDate;
    use drugwatch_scraper::GifAdapter;
    use drugwatch_shared::{EventType, FixedClock};
    use drugwatch_storage::EventFilter;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(date: &str, names: &[&str], strengths: &[&str], types: &[&str]) -> RawRow {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        RawRow {
            decision_date: date.into(),
            decision_number: "GIF-N-1/26".into(),
            drug_names: owned(names),
            strengths: owned(strengths),
            holders: vec!["Pharma S.A.".into()],
            decision_types: owned(types),
        }
    }

    // -----------------------------------------------------------------------
    // prepare_candidates
    // -----------------------------------------------------------------------

    #[test]
    fn pairs_multi_value_cells_by_position() {
        let window = LookbackWindow::ending(date(2026, 10, 17), 10);
        let rows = [row(
            "2026-10-15",
            &["Apap", "Apap Extra"],
            &["500 mg"],
            &["Wycofanie z obrotu"],
        )];

        let prepared = prepare_candidates(&rows, DataSource::Gif, &window);
        assert_eq!(prepared.candidates.len(), 2);

        let second = &prepared.candidates[1];
        assert_eq!(second.drug_name, "Apap Extra");
        assert_eq!(second.drug_strength, "");
        assert_eq!(second.marketing_authorisation_holder, "");
        // Missing decision type falls back to withdrawal.
        assert_eq!(second.event_type, EventType::Withdrawal);
        assert_eq!(second.publication_date, date(2026, 10, 15));
    }

    #[test]
    fn window_boundary_rows() {
        let window = LookbackWindow::ending(date(2026, 10, 17), 10);
        let rows = [
            row("2026-10-07", &["Included"], &["1 mg"], &["Wstrzymanie"]),
            row("2026-10-06", &["Excluded"], &["1 mg"], &["Wstrzymanie"]),
        ];

        let prepared = prepare_candidates(&rows, DataSource::Gif, &window);
        assert_eq!(prepared.candidates.len(), 1);
        assert_eq!(prepared.candidates[0].drug_name, "Included");
        assert_eq!(prepared.candidates[0].event_type, EventType::Suspension);
        assert_eq!(prepared.out_of_window, 1);
    }

    #[test]
    fn bad_dates_and_placeholders_are_skipped() {
        let window = LookbackWindow::ending(date(2026, 10, 17), 10);
        let rows = [
            row("16.10.2026", &["Apap"], &["1 mg"], &["Wycofanie"]),
            row("2026-10-16", &["-"], &["-"], &["Wycofanie"]),
            row("2026-10-16", &[""], &[""], &["Wycofanie"]),
        ];

        let prepared = prepare_candidates(&rows, DataSource::Gif, &window);
        assert!(prepared.candidates.is_empty());
        assert_eq!(prepared.skipped_rows, 1);
        assert_eq!(prepared.out_of_window, 0);
    }

    #[test]
    fn decodes_entities_in_text_fields() {
        let window = LookbackWindow::ending(date(2026, 10, 17), 10);
        let rows = [row(
            "2026-10-16",
            &["Sol&#243;n &amp; Syn"],
            &["5&nbsp;mg"],
            &["Dopuszczenie do obrotu"],
        )];

        let prepared = prepare_candidates(&rows, DataSource::Urpl, &window);
        let candidate = &prepared.candidates[0];
        assert_eq!(candidate.drug_name, "Solón & Syn");
        assert_eq!(candidate.drug_strength, "5 mg");
        assert_eq!(candidate.event_type, EventType::Registration);
        assert_eq!(candidate.source, DataSource::Urpl);
    }

    #[test]
    fn gif_fixture_candidates() {
        let adapter = GifAdapter::new(url::Url::parse("https://rdg.ezdrowie.gov.pl/").unwrap());
        let rows = extract_rows(&load_fixture("gif_decisions.html"), &adapter).unwrap();
        let window = LookbackWindow::ending(date(2026, 10, 17), 10);

        let prepared = prepare_candidates(&rows, DataSource::Gif, &window);
        assert_eq!(prepared.candidates.len(), 6);
        assert_eq!(prepared.skipped_rows, 1);
        assert_eq!(prepared.out_of_window, 1);

        let lopez = prepared
            .candidates
            .iter()
            .find(|c| c.decision_number == "GIF-N-402/26")
            .expect("entity row");
        assert_eq!(lopez.drug_name, "López & Hijos Forte");
        assert_eq!(lopez.marketing_authorisation_holder, "Laboratorios López");
        assert_eq!(lopez.event_type, EventType::Withdrawal);
    }

    // -----------------------------------------------------------------------
    // persist_events
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn per_record_failures_do_not_abort_the_batch() {
        let storage = temp_storage().await;
        let clock = FixedClock::at_date(date(2026, 10, 17));

        let window = LookbackWindow::ending(date(2026, 10, 17), 10);
        let long_name = "X".repeat(300);
        let rows = [row(
            "2026-10-16",
            &["Apap", long_name.as_str(), "Ibuprom"],
            &["1 mg", "2 mg", "3 mg"],
            &["Wycofanie"],
        )];
        let prepared = prepare_candidates(&rows, DataSource::Gif, &window);

        let result = persist_events(&storage, &prepared.candidates, &clock)
            .await
            .unwrap();
        assert_eq!(result.new_records, 2);
        assert_eq!(result.duplicates_skipped, 0);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with(&format!("Error creating record for {long_name}: ")));

        let stored = storage.list_events(&EventFilter::default()).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|e| e.created_at == clock.now()));
    }

    // -----------------------------------------------------------------------
    // ingest_source
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn second_run_only_finds_duplicates() {
        let server = serve_fixture("/", "gif_decisions.html").await;
        let storage = temp_storage().await;
        let clock = FixedClock::at_date(date(2026, 10, 17));
        let fetcher = test_fetcher();
        let ctx = context(&fetcher, &storage, &clock);
        let adapter = gif_adapter(&server);

        let first = ingest_source(&ctx, &adapter, &SilentProgress).await.unwrap();
        assert_eq!(first.new_records, 6);
        assert_eq!(first.duplicates_skipped, 0);
        assert_eq!(first.skipped_rows, 1);
        assert!(first.errors.is_empty());

        let second = ingest_source(&ctx, &adapter, &SilentProgress).await.unwrap();
        assert_eq!(second.new_records, 0);
        assert_eq!(second.duplicates_skipped, 6);
        assert_eq!(storage.count_events(None).await.unwrap(), 6);

        let runs = storage.list_scrape_runs(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.status == RUN_COMPLETED));
        assert!(runs.iter().all(|r| r.content_hash.is_some()));
    }

    #[tokio::test]
    async fn fetch_failure_is_recorded() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        let clock = FixedClock::at_date(date(2026, 10, 17));
        let fetcher = test_fetcher();
        let ctx = context(&fetcher, &storage, &clock);

        let err = ingest_source(&ctx, &gif_adapter(&server), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DrugwatchError::Network(_)));

        let runs = storage.list_scrape_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RUN_FAILED);
        assert!(runs[0].finished_at.is_some());
        assert_eq!(storage.count_events(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn page_without_table_is_an_extraction_error() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(
                wiremock::ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>Przerwa techniczna</p></body></html>"),
            )
            .mount(&server)
            .await;

        let storage = temp_storage().await;
        let clock = FixedClock::at_date(date(2026, 10, 17));
        let fetcher = test_fetcher();
        let ctx = context(&fetcher, &storage, &clock);

        let err = ingest_source(&ctx, &gif_adapter(&server), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, DrugwatchError::Extraction { .. }));
    }
}
