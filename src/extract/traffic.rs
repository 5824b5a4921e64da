use scraper::{Html, Selector};

use crate::core::error::{Result, ScoutError};
use crate::core::types::TrafficMetric;
use crate::extract::{
    element_text, parse_compact_number, parse_duration_secs, parse_percent, Extract, PageSnapshot,
};

const SURFACE: &str = "traffic";

/// Summary KPI cells on the traffic overview. Each cell pairs a label node
/// with a value node; labels are matched case-insensitively by substring.
const ITEM_SELECTORS: &[&str] = &[
    "[data-at='to-summary'] [data-at='summary-cell']",
    "[class*='SummaryCell']",
    ".summary-item",
    "dl > div",
];
const LABEL_SELECTORS: &[&str] = &["[class*='label']", "[data-at='cell-label']", "dt"];
const VALUE_SELECTORS: &[&str] = &["[class*='value']", "[data-at='cell-value']", "dd"];

/// Extracts the headline traffic figures for one domain. One snapshot yields
/// at most one record.
pub struct TrafficExtractor {
    pub domain: String,
}

impl TrafficExtractor {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }

    fn first_text(item: &scraper::ElementRef<'_>, selectors: &[&str]) -> Option<String> {
        for sel in selectors {
            if let Ok(selector) = Selector::parse(sel) {
                if let Some(element) = item.select(&selector).next() {
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

impl Extract for TrafficExtractor {
    type Record = TrafficMetric;

    fn name(&self) -> &'static str {
        SURFACE
    }

    fn extract(&self, snapshot: &PageSnapshot) -> Vec<Result<TrafficMetric>> {
        let document = Html::parse_document(&snapshot.html);

        let mut metric = TrafficMetric {
            domain: self.domain.clone(),
            visits: None,
            unique_visitors: None,
            pages_per_visit: None,
            avg_visit_duration_secs: None,
            bounce_rate: None,
            captured_at: snapshot.captured_at,
        };
        let mut found_any = false;

        for item_sel in ITEM_SELECTORS {
            let Ok(selector) = Selector::parse(item_sel) else {
                continue;
            };
            for item in document.select(&selector) {
                let Some(label) = Self::first_text(&item, LABEL_SELECTORS) else {
                    continue;
                };
                let Some(value) = Self::first_text(&item, VALUE_SELECTORS) else {
                    continue;
                };
                let label = label.to_lowercase();

                if label.contains("unique") {
                    metric.unique_visitors = parse_compact_number(&value);
                    found_any |= metric.unique_visitors.is_some();
                } else if label.contains("visits") {
                    metric.visits = parse_compact_number(&value);
                    found_any |= metric.visits.is_some();
                } else if label.contains("pages") {
                    metric.pages_per_visit = value.trim().parse::<f64>().ok();
                    found_any |= metric.pages_per_visit.is_some();
                } else if label.contains("duration") {
                    metric.avg_visit_duration_secs = parse_duration_secs(&value);
                    found_any |= metric.avg_visit_duration_secs.is_some();
                } else if label.contains("bounce") {
                    metric.bounce_rate = parse_percent(&value);
                    found_any |= metric.bounce_rate.is_some();
                }
            }
            if found_any {
                break;
            }
        }

        if found_any {
            vec![Ok(metric)]
        } else {
            // A summary pane with zero readable figures is one failed record,
            // not an empty batch — the caller should know the surface broke.
            vec![Err(ScoutError::extraction(
                SURFACE,
                format!("no traffic figures found for {}", self.domain),
            ))]
        }
    }
}
