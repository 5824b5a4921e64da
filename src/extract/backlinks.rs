use scraper::{Html, Selector};

use crate::core::error::Result;
use crate::core::types::BacklinkRecord;
use crate::extract::{element_text, required, Extract, PageSnapshot};

const SURFACE: &str = "backlinks";

/// Backlink report rows: source page, anchor text, target page.
const ROW_SELECTORS: &[&str] = &[
    "table[data-at='backlinks-table'] tbody tr",
    "div[data-at='backlinks'] table tbody tr",
    "table tbody tr",
];

/// Extracts backlink rows pointing at one domain.
pub struct BacklinkExtractor {
    pub domain: String,
}

impl BacklinkExtractor {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    fn parse_row(
        &self,
        snapshot: &PageSnapshot,
        row: scraper::ElementRef<'_>,
    ) -> Option<Result<BacklinkRecord>> {
        let link_selector = Selector::parse("a[href]").ok()?;
        let links: Vec<&str> = row
            .select(&link_selector)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| href.starts_with("http"))
            .collect();
        if links.is_empty() && element_text(&row).is_empty() {
            return None; // spacer row
        }

        // The first external link is the referring page; a link into our
        // domain, if present, is the target.
        let source_url = links
            .iter()
            .find(|href| !href.contains(&self.domain))
            .map(|s| s.to_string());
        let target_url = links
            .iter()
            .find(|href| href.contains(&self.domain))
            .map(|s| s.to_string());

        let anchor = Self::anchor_text(&row);

        Some((|| {
            Ok(BacklinkRecord {
                domain: self.domain.clone(),
                source_url: required(SURFACE, "source_url", source_url)?,
                anchor,
                target_url,
                captured_at: snapshot.captured_at,
            })
        })())
    }

    fn anchor_text(row: &scraper::ElementRef<'_>) -> Option<String> {
        for sel in ["[data-at='anchor']", "[class*='anchor']", "td:nth-child(2)"] {
            if let Ok(selector) = Selector::parse(sel) {
                if let Some(element) = row.select(&selector).next() {
                    let text = element_text(&element);
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
        }
        None
    }
}

impl Extract for BacklinkExtractor {
    type Record = BacklinkRecord;

    fn name(&self) -> &'static str {
        SURFACE
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Vec<Result<BacklinkRecord>> {
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
