//! Read API and trigger handlers.
//!
//! Handlers return an [`ApiResponse`] (HTTP status plus JSON body) so any
//! web layer, or the CLI, can serve them unchanged.

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use drugwatch_scraper::SourceAdapter;
use drugwatch_shared::{Clock, DataSource, DrugwatchError, EventType, LOOKBACK_DAYS, Result};
use drugwatch_storage::{EventFilter, Storage};

use crate::ingest::{IngestContext, ProgressReporter, ingest_source};
use crate::window::LookbackWindow;

/// Status code and JSON body of a handled request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// An error response with body `{"error": message}`.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<DrugwatchError> for ApiResponse {
    fn from(err: DrugwatchError) -> Self {
        match err {
            DrugwatchError::Validation { message } => Self::error(400, message),
            other => Self::error(500, other.to_string()),
        }
    }
}

/// Query parameters of the event list endpoint. Empty strings count as
/// absent.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub event_type: Option<String>,
    pub source: Option<String>,
    /// Restrict to the trailing lookback window.
    pub recent_only: bool,
}

impl ListQuery {
    /// Storage filter for this query, or `None` when a filter value names
    /// no known event type or source and therefore matches nothing.
    fn to_filter(&self, clock: &dyn Clock) -> Option<EventFilter> {
        let mut filter = EventFilter::default();

        if let Some(raw) = non_empty(&self.event_type) {
            filter.event_types.push(raw.parse::<EventType>().ok()?);
        }
        if let Some(raw) = non_empty(&self.source) {
            filter.source = Some(raw.parse::<DataSource>().ok()?);
        }
        if self.recent_only {
            filter.published_since =
                Some(LookbackWindow::from_clock(clock, LOOKBACK_DAYS).cutoff());
        }

        Some(filter)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| DrugwatchError::Storage(format!("failed to serialize response: {e}")))
}

// ---------------------------------------------------------------------------
// Read handlers
// ---------------------------------------------------------------------------

/// `GET /events`: stored events, newest publication date first.
#[instrument(skip_all)]
pub async fn list_events(storage: &Storage, clock: &dyn Clock, query: &ListQuery) -> ApiResponse {
    let result = async {
        let Some(filter) = query.to_filter(clock) else {
            debug!(?query, "filter value matches no events");
            return Ok(json!([]));
        };
        let events = storage.list_events(&filter).await?;
        to_json(&events)
    }
    .await;

    match result {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => e.into(),
    }
}

/// `GET /events/{id}`.
#[instrument(skip(storage))]
pub async fn event_detail(storage: &Storage, id: i64) -> ApiResponse {
    let result = async {
        match storage.get_event(id).await? {
            Some(event) => to_json(&event).map(Some),
            None => Ok(None),
        }
    }
    .await;

    match result {
        Ok(Some(body)) => ApiResponse::ok(body),
        Ok(None) => ApiResponse::error(404, "Not found."),
        Err(e) => e.into(),
    }
}

/// `GET /events/recent-withdrawals`: withdrawals and suspensions published
/// inside the lookback window.
#[instrument(skip_all)]
pub async fn recent_withdrawals(storage: &Storage, clock: &dyn Clock) -> ApiResponse {
    let window = LookbackWindow::from_clock(clock, LOOKBACK_DAYS);
    let filter = EventFilter {
        event_types: vec![EventType::Withdrawal, EventType::Suspension],
        published_since: Some(window.cutoff()),
        ..EventFilter::default()
    };

    let result = async {
        let events = storage.list_events(&filter).await?;
        Ok::<_, DrugwatchError>(json!({
            "count": events.len(),
            "period_days": window.days(),
            "events": to_json(&events)?,
        }))
    }
    .await;

    match result {
        Ok(body) => ApiResponse::ok(body),
        Err(e) => e.into(),
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// `POST /scrape`: run one source now, bypassing the daily guard.
///
/// Any fatal pipeline error becomes a 400; row-level errors are listed in
/// the success body.
#[instrument(skip_all, fields(source = %adapter.source()))]
pub async fn trigger_scrape(
    ctx: &IngestContext<'_>,
    adapter: &dyn SourceAdapter,
    progress: &dyn ProgressReporter,
) -> ApiResponse {
    let result = async {
        let result = ingest_source(ctx, adapter, progress).await?;
        let total_records = ctx.storage.count_events(None).await?;
        Ok::<_, DrugwatchError>((result, total_records))
    }
    .await;

    match result {
        Ok((result, total_records)) => ApiResponse::ok(json!({
            "message": "Scraping completed successfully",
            "new_records": result.new_records,
            "duplicates_skipped": result.duplicates_skipped,
            "total_records": total_records,
            "errors": result.errors,
        })),
        Err(e) => {
            warn!(error = %e, "triggered scrape failed");
            ApiResponse::error(400, format!("Scraping failed: {e}"))
        }
    }
}
