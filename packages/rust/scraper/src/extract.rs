//! Decision table extraction.
//!
//! Turns a fetched page into owned [`RawRow`]s. Parsing is synchronous and
//! the parsed document never leaves this module, so callers can hold the
//! result across `.await` points.

use drugwatch_shared::{DrugwatchError, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::sources::SourceAdapter;

/// One table row with every field still in its raw (trimmed) cell form.
///
/// Product cells may hold several entries (one per `div.column`); the
/// vectors are paired positionally by [`RawRow::entries`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub decision_date: String,
    pub decision_number: String,
    pub drug_names: Vec<String>,
    pub strengths: Vec<String>,
    pub holders: Vec<String>,
    pub decision_types: Vec<String>,
}

/// A single product entry taken from a [`RawRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub drug_name: String,
    pub strength: String,
    pub holder: String,
    pub decision_type: String,
}

impl RawRow {
    /// Pair the multi-value cells by index. The drug name list drives the
    /// iteration; shorter lists contribute empty strings.
    pub fn entries(&self) -> Vec<RawEntry> {
        self.drug_names
            .iter()
            .enumerate()
            .map(|(i, name)| RawEntry {
                drug_name: name.clone(),
                strength: value_at(&self.strengths, i),
                holder: value_at(&self.holders, i),
                decision_type: value_at(&self.decision_types, i),
            })
            .collect()
    }
}

fn value_at(values: &[String], index: usize) -> String {
    values.get(index).cloned().unwrap_or_default()
}

/// Extract every data row of the adapter's decisions table from `html`.
///
/// Fails when the page has no table at all or the table has no body.
/// Rows with fewer cells than the layout requires are skipped.
#[instrument(skip_all, fields(source = adapter.name()))]
pub fn extract_rows(html: &str, adapter: &dyn SourceAdapter) -> Result<Vec<RawRow>> {
    let doc = Html::parse_document(html);

    let table = adapter
        .locate_table(&doc)
        .ok_or_else(|| DrugwatchError::extraction("could not find decisions table on the page"))?;

    let tbody_sel = Selector::parse("tbody").unwrap();
    let tbody = table
        .select(&tbody_sel)
        .next()
        .ok_or_else(|| DrugwatchError::extraction("could not find table body"))?;

    let layout = adapter.layout();
    let mut rows = Vec::new();

    for (index, tr) in child_elements(tbody, "tr").enumerate() {
        let cells: Vec<ElementRef<'_>> = child_elements(tr, "td").collect();
        if cells.len() < layout.min_cells {
            debug!(row = index, cells = cells.len(), "skipping short row");
            continue;
        }

        rows.push(RawRow {
            decision_date: cell_text(cells[layout.date]),
            decision_number: cell_text(cells[layout.decision_number]),
            drug_names: multi_values(cells[layout.drug_name]),
            strengths: multi_values(cells[layout.strength]),
            holders: multi_values(cells[layout.holder]),
            decision_types: multi_values(cells[layout.decision_type]),
        });
    }

    debug!(rows = rows.len(), "extracted table rows");
    Ok(rows)
}

fn child_elements<'a>(
    parent: ElementRef<'a>,
    tag: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == tag)
}

/// Visible text of an element with runs of whitespace collapsed.
///
/// Text nodes are joined as-is first, so inline markup (`<b>`, `<sup>`)
/// adds no spaces of its own.
fn cell_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// The `div.column` entries of a cell, or the whole cell as one entry.
fn multi_values(cell: ElementRef<'_>) -> Vec<String> {
    let column_sel = Selector::parse("div.column").unwrap();
    let columns: Vec<String> = cell.select(&column_sel).map(cell_text).collect();

    if columns.is_empty() {
        vec![cell_text(cell)]
    } else {
        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{GifAdapter, UrplAdapter};
    use url::Url;

    fn gif() -> GifAdapter {
        GifAdapter::new(Url::parse("https://rdg.ezdrowie.gov.pl/").unwrap())
    }

    fn wrap_rows(rows: &str) -> String {
        format!(
            r#"<html><body><table class="table-decisions">
            <thead><tr><th>Data</th></tr></thead>
            <tbody>{rows}</tbody></table></body></html>"#
        )
    }

    #[test]
    fn extracts_single_and_multi_value_cells() {
        let html = wrap_rows(
            r#"<tr>
                <td> 2026-10-15 </td><td>GIF-1/26</td>
                <td><div class="column">Apap</div><div class="column">Apap Extra</div></td>
                <td><div class="column">500 mg</div></td>
                <td>Us   Pharmacia</td>
                <td>Wycofanie z obrotu</td>
                <td>A1</td><td>2027-01</td>
            </tr>"#,
        );

        let rows = extract_rows(&html, &gif()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.decision_date, "2026-10-15");
        assert_eq!(row.drug_names, ["Apap", "Apap Extra"]);
        assert_eq!(row.strengths, ["500 mg"]);
        assert_eq!(row.holders, ["Us Pharmacia"]);

        let entries = row.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].strength, "500 mg");
        assert_eq!(entries[0].holder, "Us Pharmacia");
        assert_eq!(entries[1].drug_name, "Apap Extra");
        assert_eq!(entries[1].strength, "");
        assert_eq!(entries[1].holder, "");
        assert_eq!(entries[1].decision_type, "");
    }

    #[test]
    fn inline_markup_keeps_cell_text_intact() {
        let html = wrap_rows(
            r#"<tr>
                <td>2026-10-16</td><td>GIF-N-<b>412</b>/26</td>
                <td>Apap<sup>®</sup></td><td>500
                   mg</td><td><span>US</span> Pharmacia</td><td>Wycofanie</td><td></td><td></td>
            </tr>"#,
        );

        let rows = extract_rows(&html, &gif()).unwrap();
        assert_eq!(rows[0].decision_number, "GIF-N-412/26");
        assert_eq!(rows[0].drug_names, ["Apap®"]);
        assert_eq!(rows[0].strengths, ["500 mg"]);
        assert_eq!(rows[0].holders, ["US Pharmacia"]);
    }

    #[test]
    fn short_rows_are_skipped() {
        let html = wrap_rows(
            r#"<tr><td colspan="8">Brak decyzji w tym miesiącu</td></tr>
               <tr><td>2026-10-15</td><td>N</td><td>D</td><td>S</td><td>H</td><td>T</td><td></td><td></td></tr>"#,
        );
        let rows = extract_rows(&html, &gif()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].decision_number, "N");
    }

    #[test]
    fn missing_table_is_an_error() {
        let err = extract_rows("<html><body><p>Przerwa techniczna</p></body></html>", &gif())
            .unwrap_err();
        assert!(err.to_string().contains("could not find decisions table"));
    }

    #[test]
    fn missing_body_is_an_error() {
        // A header-only table gets no implicit tbody from the parser.
        let html = r#"<table class="table-decisions"><thead><tr><th>Data</th></tr></thead></table>"#;
        let err = extract_rows(html, &gif()).unwrap_err();
        assert!(matches!(err, DrugwatchError::Extraction { .. }));
        assert!(err.to_string().contains("could not find table body"));
    }

    #[test]
    fn urpl_accepts_six_cell_rows() {
        let html = r#"<table class="decisions"><tbody>
            <tr><td>2026-10-16</td><td>URPL/7</td><td>Ibuprom</td><td>200 mg</td><td>USP Zdrowie</td><td>Dopuszczenie do obrotu</td></tr>
        </tbody></table>"#;
        let adapter = UrplAdapter::new(Url::parse("https://urpl.gov.pl/pl/decyzje").unwrap());
        let rows = extract_rows(html, &adapter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].decision_types, ["Dopuszczenie do obrotu"]);

        // The same row is too short for the GIF layout.
        let html = html.replace("class=\"decisions\"", "class=\"table-decisions\"");
        assert!(extract_rows(&html, &gif()).unwrap().is_empty());
    }
}
