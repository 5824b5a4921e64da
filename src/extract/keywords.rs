use scraper::{Html, Selector};

use crate::core::error::Result;
use crate::core::types::KeywordMetric;
use crate::extract::{element_text, parse_compact_number, required, Extract, PageSnapshot};

const SURFACE: &str = "keywords";

/// Organic-positions report rows. The dashboard renders a plain table inside
/// the report container; header rows carry `th` cells and are skipped.
const ROW_SELECTORS: &[&str] = &[
    "table[data-ui-name='Table'] tbody tr",
    "div[data-at='positions-table'] table tbody tr",
    "table tbody tr",
];

/// Cell order in the organic positions table: keyword, position, volume, URL.
const CELL_SELECTOR: &str = "td";

/// Extracts organic keyword rankings for one domain.
pub struct KeywordExtractor {
    pub domain: String,
}

impl KeywordExtractor {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    fn parse_row(&self, snapshot: &PageSnapshot, row: scraper::ElementRef<'_>) -> Option<Result<KeywordMetric>> {
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
        let url = self.row_url(&row).or_else(|| {
            cells
                .get(3)
                .filter(|u| u.starts_with("http") || u.starts_with('/'))
                .cloned()
        });

        Some((|| {
            Ok(KeywordMetric {
                domain: self.domain.clone(),
                keyword: required(SURFACE, "keyword", keyword)?,
                position: required(SURFACE, "position", position)?,
                search_volume,
                url,
                captured_at: snapshot.captured_at,
            })
        })())
    }

    fn row_url(&self, row: &scraper::ElementRef<'_>) -> Option<String> {
        let link = Selector::parse("a[href]").ok()?;
        row.select(&link)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| href.contains(&self.domain))
            .map(|s| s.to_string())
    }
}

impl Extract for KeywordExtractor {
    type Record = KeywordMetric;

    fn name(&self) -> &'static str {
        SURFACE
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Vec<Result<KeywordMetric>> {
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
