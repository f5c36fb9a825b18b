//! GIF (Chief Pharmaceutical Inspectorate) decisions register.
//!
//! Row cells: decision date, decision number, product name, strength,
//! responsible entity, decision type, then batch/expiry columns we ignore.

use drugwatch_shared::DataSource;
use url::Url;

use super::{ColumnLayout, SourceAdapter};

pub struct GifAdapter {
    url: Url,
}

impl GifAdapter {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl SourceAdapter for GifAdapter {
    fn source(&self) -> DataSource {
        DataSource::Gif
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn table_selector(&self) -> &str {
        "table.table-decisions"
    }

    fn layout(&self) -> ColumnLayout {
        ColumnLayout {
            min_cells: 8,
            date: 0,
            decision_number: 1,
            drug_name: 2,
            strength: 3,
            holder: 4,
            decision_type: 5,
        }
    }

    fn name(&self) -> &str {
        "gif"
    }
}
