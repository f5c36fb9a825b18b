//! Source adapter trait and the built-in government sources.
//!
//! Each adapter knows where its decisions table lives and which column holds
//! which field. Extraction itself is shared (see [`crate::extract`]).

mod gif;
mod urpl;

use drugwatch_shared::{AppConfig, DataSource};
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub use gif::GifAdapter;
pub use urpl::UrplAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Column positions of the fields we read from a decisions table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    /// Rows with fewer `td` cells are header/notice rows and are skipped.
    pub min_cells: usize,
    pub date: usize,
    pub decision_number: usize,
    pub drug_name: usize,
    pub strength: usize,
    pub holder: usize,
    pub decision_type: usize,
}

/// Trait for a scraped government source.
pub trait SourceAdapter: Send + Sync {
    /// Which feed records from this adapter are attributed to.
    fn source(&self) -> DataSource;

    /// Page holding the decisions table.
    fn url(&self) -> &Url;

    /// CSS selector for the preferred (class-qualified) table.
    fn table_selector(&self) -> &str;

    /// Where each field sits within a row.
    fn layout(&self) -> ColumnLayout;

    /// Human-readable adapter name for tracing.
    fn name(&self) -> &str;

    /// Find the decisions table: the class-qualified table if present,
    /// otherwise the first table on the page.
    fn locate_table<'a>(&self, doc: &'a Html) -> Option<ElementRef<'a>> {
        let preferred = Selector::parse(self.table_selector())
            .ok()
            .and_then(|sel| doc.select(&sel).next());

        preferred.or_else(|| {
            let any_table = Selector::parse("table").unwrap();
            doc.select(&any_table).next()
        })
    }
}

/// Build the adapter for `source` pointed at `url`.
pub fn adapter_for(source: DataSource, url: Url) -> Box<dyn SourceAdapter> {
    match source {
        DataSource::Gif => Box::new(GifAdapter::new(url)),
        DataSource::Urpl => Box::new(UrplAdapter::new(url)),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds the adapters the daily run visits, in a fixed order.
pub struct SourceRegistry {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl SourceRegistry {
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>) -> Self {
        Self { adapters }
    }

    /// Adapters for every source enabled in `config` (GIF first, then URPL).
    pub fn from_config(config: &AppConfig) -> Self {
        let adapters = DataSource::ALL
            .into_iter()
            .filter(|s| config.sources.get(*s).enabled)
            .map(|s| adapter_for(s, config.sources.get(s).url.clone()))
            .collect();
        Self { adapters }
    }

    pub fn adapters(&self) -> impl Iterator<Item = &dyn SourceAdapter> {
        self.adapters.iter().map(|a| a.as_ref())
    }

    pub fn get(&self, source: DataSource) -> Option<&dyn SourceAdapter> {
        self.adapters().find(|a| a.source() == source)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_follows_enabled_flags() {
        let mut config = AppConfig::default();
        let registry = SourceRegistry::from_config(&config);
        let names: Vec<&str> = registry.adapters().map(|a| a.name()).collect();
        assert_eq!(names, ["gif", "urpl"]);

        config.sources.gif.enabled = false;
        let registry = SourceRegistry::from_config(&config);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(DataSource::Gif).is_none());
        assert_eq!(
            registry.get(DataSource::Urpl).map(|a| a.source()),
            Some(DataSource::Urpl)
        );
    }

    #[test]
    fn locate_prefers_class_qualified_table() {
        let html = r#"<html><body>
            <table id="nav"><tbody><tr><td>menu</td></tr></tbody></table>
            <table class="table-decisions"><tbody><tr><td>decision</td></tr></tbody></table>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let adapter = GifAdapter::new(Url::parse("https://rdg.ezdrowie.gov.pl/").unwrap());

        let table = adapter.locate_table(&doc).expect("table found");
        assert_eq!(table.value().attr("class"), Some("table-decisions"));
    }

    #[test]
    fn locate_falls_back_to_first_table() {
        let html = r#"<html><body>
            <table id="first"><tbody><tr><td>a</td></tr></tbody></table>
            <table id="second"><tbody><tr><td>b</td></tr></tbody></table>
        </body></html>"#;
        let doc = Html::parse_document(html);
        let adapter = GifAdapter::new(Url::parse("https://rdg.ezdrowie.gov.pl/").unwrap());

        let table = adapter.locate_table(&doc).expect("table found");
        assert_eq!(table.value().attr("id"), Some("first"));
    }

    #[test]
    fn locate_without_any_table() {
        let doc = Html::parse_document("<html><body><p>maintenance</p></body></html>");
        let adapter = UrplAdapter::new(Url::parse("https://urpl.gov.pl/pl/decyzje").unwrap());
        assert!(adapter.locate_table(&doc).is_none());
    }
}
