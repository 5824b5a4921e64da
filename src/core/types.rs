use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A brand under observation — the analysis target or one of its competitors.
/// The domain is the natural key; the name is presentation only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub domain: String,
}

/// Records that can be deduplicated by a stable content-derived key.
/// The scroll harvester accumulates records by this key across cycles.
pub trait RecordKey {
    fn record_key(&self) -> String;
}

/// UTC day bucket used to key metric files. Re-scraping the same bucket
/// overwrites rather than duplicates.
pub fn capture_bucket(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d").to_string()
}

// ── Scraped record types ─────────────────────────────────────────────────────

/// One organic keyword ranking row for a domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeywordMetric {
    pub domain: String,
    pub keyword: String,
    pub position: u32,
    #[serde(default)]
    pub search_volume: Option<u64>,
    #[serde(default)]
    pub url: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl RecordKey for KeywordMetric {
    fn record_key(&self) -> String {
        format!("{}|{}", self.domain, self.keyword.to_lowercase())
    }
}

/// One paid (ads) keyword row for a domain, with its cost-per-click.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaidKeywordMetric {
    pub domain: String,
    pub keyword: String,
    pub position: u32,
    #[serde(default)]
    pub search_volume: Option<u64>,
    /// Cost per click in the database's currency, as shown.
    #[serde(default)]
    pub cpc: Option<f64>,
    /// Share of the domain's paid traffic this keyword drives, 0..=1.
    #[serde(default)]
    pub traffic_share: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl RecordKey for PaidKeywordMetric {
    fn record_key(&self) -> String {
        format!("{}|{}", self.domain, self.keyword.to_lowercase())
    }
}

/// CPC aggregates across every captured paid keyword row. What competitors
/// pay per click in the shared market, one summary per capture bucket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpcBenchmark {
    pub avg_cpc: f64,
    pub median_cpc: f64,
    pub min_cpc: f64,
    pub max_cpc: f64,
    pub n_keywords: usize,
}

impl CpcBenchmark {
    /// `None` when no row carried a parseable CPC.
    pub fn from_records(records: &[PaidKeywordMetric]) -> Option<Self> {
        let mut cpcs: Vec<f64> = records.iter().filter_map(|r| r.cpc).collect();
        if cpcs.is_empty() {
            return None;
        }
        cpcs.sort_by(f64::total_cmp);
        Some(Self {
            avg_cpc: cpcs.iter().sum::<f64>() / cpcs.len() as f64,
            median_cpc: cpcs[cpcs.len() / 2],
            min_cpc: cpcs[0],
            max_cpc: cpcs[cpcs.len() - 1],
            n_keywords: records.len(),
        })
    }
}

/// Headline traffic figures for a domain, one row per capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrafficMetric {
    pub domain: String,
    #[serde(default)]
    pub visits: Option<u64>,
    #[serde(default)]
    pub unique_visitors: Option<u64>,
    #[serde(default)]
    pub pages_per_visit: Option<f64>,
    #[serde(default)]
    pub avg_visit_duration_secs: Option<u64>,
    #[serde(default)]
    pub bounce_rate: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl RecordKey for TrafficMetric {
    fn record_key(&self) -> String {
        self.domain.clone()
    }
}

/// One backlink row: a page that links to the observed domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacklinkRecord {
    pub domain: String,
    pub source_url: String,
    #[serde(default)]
    pub anchor: Option<String>,
    #[serde(default)]
    pub target_url: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl RecordKey for BacklinkRecord {
    fn record_key(&self) -> String {
        format!(
            "{}|{}",
            self.source_url,
            self.target_url.as_deref().unwrap_or("")
        )
    }
}

/// A harvested customer review.
///
/// The source UI exposes no stable native review ID, so `review_id` is derived
/// from content: truncated SHA-256 of author + text + location. Two genuinely
/// distinct reviews with identical fields would merge — accepted tradeoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub review_id: String,
    /// The search query / place this review was harvested from.
    pub source_location: String,
    /// Hash of the reviewer name; raw names are never persisted.
    pub author_hash: String,
    /// Star rating, 1-5.
    pub rating: u8,
    pub text: String,
    /// Raw relative date string as shown in the UI ("2 weeks ago"); not parsed.
    #[serde(default)]
    pub posted_at: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl Review {
    /// Content-derived identity hash. The single source of truth for the
    /// dedup key — keep the input fields in sync with the docs above.
    pub fn derive_id(author: &str, text: &str, location: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(author.as_bytes());
        hasher.update(b"|");
        hasher.update(text.as_bytes());
        hasher.update(b"|");
        hasher.update(location.as_bytes());
        let digest = hasher.finalize();
        hex_prefix(&digest, 16)
    }

    pub fn hash_author(author: &str) -> String {
        let digest = Sha256::digest(author.as_bytes());
        hex_prefix(&digest, 12)
    }
}

impl RecordKey for Review {
    fn record_key(&self) -> String {
        self.review_id.clone()
    }
}

fn hex_prefix(digest: &[u8], bytes: usize) -> String {
    digest
        .iter()
        .take(bytes)
        .map(|b| format!("{:02x}", b))
        .collect()
}

// ── Analysis output types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentCounts {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl SentimentCounts {
    pub fn tally(&mut self, label: Sentiment) {
        match label {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Neutral => self.neutral += 1,
            Sentiment::Negative => self.negative += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub topic_id: usize,
    pub top_terms: Vec<String>,
    pub member_review_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyPhrase {
    pub phrase: String,
    pub score: f64,
}

/// Wholesale-regenerated analysis document. A pure function of the current
/// review set plus the analysis settings (seed included) — identical inputs
/// must reproduce this bit-for-bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub n_reviews: usize,
    pub sentiment_counts: SentimentCounts,
    pub topics: Vec<Topic>,
    pub key_phrases: Vec<KeyPhrase>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_id_is_stable_and_content_derived() {
        let a = Review::derive_id("jane", "great candles", "Brand X store NYC");
        let b = Review::derive_id("jane", "great candles", "Brand X store NYC");
        let c = Review::derive_id("jane", "terrible candles", "Brand X store NYC");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32); // 16 bytes hex-encoded
    }

    #[test]
    fn author_names_never_survive_hashing() {
        let h = Review::hash_author("Jane Doe");
        assert!(!h.contains("Jane"));
        assert_eq!(h, Review::hash_author("Jane Doe"));
    }

    #[test]
    fn cpc_benchmark_aggregates_and_ignores_missing_cpcs() {
        let rec = |cpc: Option<f64>| PaidKeywordMetric {
            domain: "wickandco.com".into(),
            keyword: "soy candles".into(),
            position: 1,
            search_volume: None,
            cpc,
            traffic_share: None,
            captured_at: Utc::now(),
        };
        let records = vec![rec(Some(2.0)), rec(Some(4.0)), rec(None), rec(Some(3.0))];
        let b = CpcBenchmark::from_records(&records).unwrap();
        assert_eq!(b.avg_cpc, 3.0);
        assert_eq!(b.median_cpc, 3.0);
        assert_eq!(b.min_cpc, 2.0);
        assert_eq!(b.max_cpc, 4.0);
        assert_eq!(b.n_keywords, 4);

        assert!(CpcBenchmark::from_records(&[rec(None)]).is_none());
    }

    #[test]
    fn bucket_is_utc_day() {
        let ts = DateTime::parse_from_rfc3339("2026-03-05T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(capture_bucket(&ts), "2026-03-05");
    }
}
