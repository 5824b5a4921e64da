use scraper::{Html, Selector};

use crate::core::error::Result;
use crate::core::types::PaidKeywordMetric;
use crate::extract::{
    element_text, parse_compact_number, parse_money, parse_percent, required, Extract,
    PageSnapshot,
};

const SURFACE: &str = "paid";

/// Advertising-research report rows: same table shell as the organic
/// positions report, with CPC and traffic-share columns after the volume.
const ROW_SELECTORS: &[&str] = &[
    "table[data-ui-name='Table'] tbody tr",
    "div[data-at='positions-table'] table tbody tr",
    "table tbody tr",
];

/// Cell order: keyword, position, volume, CPC, traffic share.
const CELL_SELECTOR: &str = "td";

/// Extracts paid keyword positions (with CPC) for one domain.
pub struct PaidKeywordExtractor {
    pub domain: String,
}

impl PaidKeywordExtractor {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    fn parse_row(
        &self,
        snapshot: &PageSnapshot,
        row: scraper::ElementRef<'_>,
    ) -> Option<Result<PaidKeywordMetric>> {
        let cell_selector = Selector::parse(CELL_SELECTOR).ok()?;
        let cells: Vec<String> = row
            .select(&cell_selector)
            .map(|c| element_text(&c))
            .collect();
        // Header or spacer rows have no data cells at all — not a record.
        if cells.is_empty() {
            return None;
        }

        let keyword = cells.first().cloned().filter(|k| !k.is_empty());
        let position = cells
            .get(1)
            .and_then(|p| p.trim().parse::<u32>().ok())
            .filter(|p| *p > 0);
        let search_volume = cells.get(2).and_then(|v| parse_compact_number(v));
        let cpc = cells.get(3).and_then(|c| parse_money(c));
        let traffic_share = cells.get(4).and_then(|t| parse_percent(t));

        Some((|| {
            Ok(PaidKeywordMetric {
                domain: self.domain.clone(),
                keyword: required(SURFACE, "keyword", keyword)?,
                position: required(SURFACE, "position", position)?,
                search_volume,
                cpc,
                traffic_share,
                captured_at: snapshot.captured_at,
            })
        })())
    }
}

impl Extract for PaidKeywordExtractor {
    type Record = PaidKeywordMetric;

    fn name(&self) -> &'static str {
        SURFACE
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Vec<Result<PaidKeywordMetric>> {
        let document = Html::parse_document(&snapshot.html);

        for row_sel in ROW_SELECTORS {
            if let Ok(selector) = Selector::parse(row_sel) {
                let rows: Vec<_> = document.select(&selector).collect();
                if !rows.is_empty() {
                    return rows
                        .into_iter()
                        .filter_map(|row| self.parse_row(snapshot, row))
                        .collect();
                }
            }
        }

        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::partition_records;

    const FIXTURE: &str = r#"
        <table><thead><tr><th>Keyword</th><th>Pos</th><th>Volume</th><th>CPC</th><th>Traffic %</th></tr></thead>
        <tbody>
          <tr><td>soy candles</td><td>2</td><td>12,100</td><td>$2.45</td><td>25%</td></tr>
          <tr><td>candle gift set</td><td>5</td><td>5.4K</td><td>$1.10</td><td>6.2%</td></tr>
          <tr><td></td><td>1</td><td>900</td><td>$0.80</td><td>1.0%</td></tr>
          <tr><td>wax melts</td><td>9</td><td>n/a</td><td>n/a</td><td></td></tr>
        </tbody></table>
    "#;

    #[test]
    fn parses_cpc_rows_and_fails_only_the_unnamed_one() {
        let extractor = PaidKeywordExtractor::new("wickandco.com");
        let batch = extractor.extract(&PageSnapshot::new("u", FIXTURE));
        let (records, dropped) = partition_records("paid", batch);

        assert_eq!(records.len(), 3);
        assert_eq!(dropped, 1); // empty keyword cell is a required-field failure

        assert_eq!(records[0].keyword, "soy candles");
        assert_eq!(records[0].position, 2);
        assert_eq!(records[0].cpc, Some(2.45));
        assert_eq!(records[0].traffic_share, Some(0.25));

        assert_eq!(records[1].search_volume, Some(5_400));

        // CPC and share are optional — absent, not an error
        assert_eq!(records[2].keyword, "wax melts");
        assert_eq!(records[2].cpc, None);
        assert_eq!(records[2].traffic_share, None);
    }

    #[test]
    fn record_key_is_domain_scoped() {
        use crate::core::types::RecordKey;
        let extractor = PaidKeywordExtractor::new("wickandco.com");
        let (records, _) =
            partition_records("paid", extractor.extract(&PageSnapshot::new("u", FIXTURE)));
        assert_eq!(records[0].record_key(), "wickandco.com|soy candles");
    }
}
