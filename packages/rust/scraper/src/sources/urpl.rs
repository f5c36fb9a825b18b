//! URPL (Office for Registration of Medicinal Products) decisions page.
//!
//! Six-cell rows in the same field order as the GIF register.

use drugwatch_shared::DataSource;
use url::Url;

use super::{ColumnLayout, SourceAdapter};

pub struct UrplAdapter {
    url: Url,
}

impl UrplAdapter {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

impl SourceAdapter for UrplAdapter {
    fn source(&self) -> DataSource {
        DataSource::Urpl
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn table_selector(&self) -> &str {
        "table.decisions"
    }

    fn layout(&self) -> ColumnLayout {
        ColumnLayout {
            min_cells: 6,
            date: 0,
            decision_number: 1,
            drug_name: 2,
            strength: 3,
            holder: 4,
            decision_type: 5,
        }
    }

    fn name(&self) -> &str {
        "urpl"
    }
}
