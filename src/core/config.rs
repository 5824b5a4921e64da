use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, ScoutError};
use crate::core::types::Identity;

// ---------------------------------------------------------------------------
// Settings — file-based config (rivalscope.json) with env-var path override
// ---------------------------------------------------------------------------

pub const ENV_CONFIG_PATH: &str = "RIVALSCOPE_CONFIG";

/// Fully-resolved run settings. Loaded and validated once at startup; the
/// pipelines treat this as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub target: Identity,
    /// Ordered — the order defines report presentation, nothing else.
    #[serde(default)]
    pub competitors: Vec<Identity>,
    #[serde(default)]
    pub market_keywords: Vec<String>,
    #[serde(default)]
    pub semrush: SemrushSettings,
    #[serde(default)]
    pub reviews: ReviewSettings,
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub navigation: NavigationSettings,
    #[serde(default)]
    pub pipelines: PipelineToggles,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemrushSettings {
    /// Regional database code, e.g. "us", "uk".
    #[serde(default = "default_database")]
    pub database: String,
    /// Port of the already-running Chrome started with --remote-debugging-port.
    #[serde(default = "default_debug_port")]
    pub chrome_debug_port: u16,
    #[serde(default = "default_debug_host")]
    pub chrome_debug_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSettings {
    /// Locations appended to competitor names when searching Maps.
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,
    #[serde(default)]
    pub store_types: Vec<String>,
    /// Hard ceiling on harvest cycles. Mandatory — the page has no end-of-list signal.
    #[serde(default = "default_max_scroll_count")]
    pub max_scroll_count: u32,
    /// Stop after this many consecutive cycles with zero new records.
    #[serde(default = "default_stale_cycle_limit")]
    pub stale_cycle_limit: u32,
    /// Settle wait after each scroll before the next snapshot.
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,
    /// Reviews shorter than this are noise and dropped at extraction.
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Polarity below this is negative regardless of rating.
    #[serde(default = "default_sentiment_threshold")]
    pub sentiment_threshold: f64,
    /// Ratings at or below this are negative regardless of text polarity.
    #[serde(default = "default_min_rating_negative")]
    pub min_rating_negative: u8,
    #[serde(default = "default_n_topics")]
    pub n_topics: usize,
    #[serde(default = "default_n_key_phrases")]
    pub n_key_phrases: usize,
    /// Pinned RNG seed for topic clustering. Report determinism depends on it.
    #[serde(default = "default_topic_seed")]
    pub topic_seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationSettings {
    /// Ceiling for DOM-ready + element-visibility polling.
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    /// Resource-count quiet window that counts as "page settled".
    #[serde(default = "default_settle_quiet_ms")]
    pub settle_quiet_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineToggles {
    #[serde(default = "default_true")]
    pub semrush: bool,
    #[serde(default = "default_true")]
    pub traffic: bool,
    #[serde(default = "default_true")]
    pub reviews: bool,
    #[serde(default = "default_true")]
    pub sentiment: bool,
}

fn default_database() -> String {
    "us".to_string()
}
fn default_debug_port() -> u16 {
    9222
}
fn default_debug_host() -> String {
    "127.0.0.1".to_string()
}
fn default_locations() -> Vec<String> {
    vec!["New York".to_string(), "Los Angeles".to_string()]
}
fn default_max_scroll_count() -> u32 {
    15
}
fn default_stale_cycle_limit() -> u32 {
    3
}
fn default_scroll_settle_ms() -> u64 {
    1500
}
fn default_min_text_len() -> usize {
    10
}
fn default_sentiment_threshold() -> f64 {
    -0.1
}
fn default_min_rating_negative() -> u8 {
    3
}
fn default_n_topics() -> usize {
    10
}
fn default_n_key_phrases() -> usize {
    20
}
fn default_topic_seed() -> u64 {
    42
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    8000
}
fn default_jitter_ms() -> u64 {
    250
}
fn default_ready_timeout_ms() -> u64 {
    20_000
}
fn default_settle_quiet_ms() -> u64 {
    1500
}
fn default_true() -> bool {
    true
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for SemrushSettings {
    fn default() -> Self {
        Self {
            database: default_database(),
            chrome_debug_port: default_debug_port(),
            chrome_debug_host: default_debug_host(),
        }
    }
}
impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            locations: default_locations(),
            store_types: Vec::new(),
            max_scroll_count: default_max_scroll_count(),
            stale_cycle_limit: default_stale_cycle_limit(),
            scroll_settle_ms: default_scroll_settle_ms(),
            min_text_len: default_min_text_len(),
        }
    }
}
impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            sentiment_threshold: default_sentiment_threshold(),
            min_rating_negative: default_min_rating_negative(),
            n_topics: default_n_topics(),
            n_key_phrases: default_n_key_phrases(),
            topic_seed: default_topic_seed(),
        }
    }
}
impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}
impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            ready_timeout_ms: default_ready_timeout_ms(),
            settle_quiet_ms: default_settle_quiet_ms(),
        }
    }
}
impl Default for PipelineToggles {
    fn default() -> Self {
        Self {
            semrush: true,
            traffic: true,
            reviews: true,
            sentiment: true,
        }
    }
}

impl Settings {
    /// Load `rivalscope.json` from standard locations.
    ///
    /// Search order (first found wins):
    /// 1. `RIVALSCOPE_CONFIG` env var path
    /// 2. `./rivalscope.json`
    /// 3. `../rivalscope.json`
    ///
    /// Unlike optional service config, a missing file is an error: the target
    /// and competitor domains have no sensible defaults.
    pub fn load() -> Result<Self> {
        let mut candidates = vec![
            PathBuf::from("rivalscope.json"),
            PathBuf::from("../rivalscope.json"),
        ];
        if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
            candidates.insert(0, PathBuf::from(env_path));
        }

        for path in &candidates {
            match std::fs::read_to_string(path) {
                Ok(contents) => {
                    let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                        ScoutError::Config(format!("parse error in {}: {}", path.display(), e))
                    })?;
                    settings.validate()?;
                    tracing::info!("settings loaded from {}", path.display());
                    return Ok(settings);
                }
                Err(_) => continue,
            }
        }

        Err(ScoutError::Config(format!(
            "no rivalscope.json found (searched: {})",
            candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }

    pub fn validate(&self) -> Result<()> {
        if self.target.domain.trim().is_empty() {
            return Err(ScoutError::Config("target.domain must be set".into()));
        }
        if self.competitors.iter().any(|c| c.domain.trim().is_empty()) {
            return Err(ScoutError::Config(
                "every competitor needs a non-empty domain".into(),
            ));
        }
        if self.analysis.n_topics == 0 {
            return Err(ScoutError::Config("analysis.n_topics must be >= 1".into()));
        }
        if !(1..=5).contains(&self.analysis.min_rating_negative) {
            return Err(ScoutError::Config(
                "analysis.min_rating_negative must be within 1-5".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.analysis.sentiment_threshold) {
            return Err(ScoutError::Config(
                "analysis.sentiment_threshold must be within [-1, 1]".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ScoutError::Config("retry.max_attempts must be >= 1".into()));
        }
        if self.reviews.max_scroll_count == 0 {
            return Err(ScoutError::Config(
                "reviews.max_scroll_count must be >= 1 (the ceiling is mandatory)".into(),
            ));
        }
        Ok(())
    }

    /// Target domain followed by competitor domains, presentation order.
    pub fn all_domains(&self) -> Vec<String> {
        std::iter::once(self.target.domain.clone())
            .chain(self.competitors.iter().map(|c| c.domain.clone()))
            .collect()
    }

    pub fn debug_endpoint(&self) -> String {
        format!(
            "{}:{}",
            self.semrush.chrome_debug_host, self.semrush.chrome_debug_port
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> Settings {
        serde_json::from_str(
            r#"{
                "target": {"name": "Acme Candles", "domain": "acmecandles.com"},
                "competitors": [
                    {"name": "Wick & Co", "domain": "wickandco.com"},
                    {"name": "Glow Works", "domain": "glowworks.io"}
                ],
                "market_keywords": ["scented candles", "soy candles"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn defaults_fill_omitted_sections() {
        let s = minimal();
        assert_eq!(s.semrush.chrome_debug_port, 9222);
        assert_eq!(s.reviews.max_scroll_count, 15);
        assert_eq!(s.reviews.stale_cycle_limit, 3);
        assert_eq!(s.analysis.topic_seed, 42);
        assert!(s.pipelines.sentiment);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn all_domains_keeps_target_first_and_order() {
        let s = minimal();
        assert_eq!(
            s.all_domains(),
            vec!["acmecandles.com", "wickandco.com", "glowworks.io"]
        );
    }

    #[test]
    fn validation_rejects_zero_ceiling() {
        let mut s = minimal();
        s.reviews.max_scroll_count = 0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validation_rejects_empty_target() {
        let mut s = minimal();
        s.target.domain = " ".into();
        assert!(s.validate().is_err());
    }
}
