//! Pipeline orchestration: which surfaces to visit, in what order, and how
//! much of a run survives a broken one.
//!
//! Error containment mirrors the record/batch split in `extract`: a failed
//! sub-step (one domain, one surface) is logged and counted, never fatal to
//! its pipeline; only a lost browser connection aborts browser-bound work.
//! The `sentiment` pipeline runs on stored data and is independent of the
//! browser entirely.

pub mod urls;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::core::config::Settings;
use crate::core::error::{Result, ScoutError};
use crate::core::types::{capture_bucket, CpcBenchmark};
use crate::extract::{
    partition_records, BacklinkExtractor, Extract, KeywordExtractor, PaidKeywordExtractor,
    ReviewExtractor, TrafficExtractor,
};
use crate::harvest::{ScrollHarvester, SessionFeed};
use crate::session::Session;
use crate::store::{screenshot_dir, AnalysisStore, MetricStore, ReviewStore};

/// First search hit in the Maps results feed.
const RESULT_SELECTORS: &[&str] = &["[role='feed'] > div a", "[role='feed'] > div"];

/// The reviews tab / panel opener, several UI generations deep.
const REVIEW_TAB_SELECTORS: &[&str] = &[
    "button[aria-label*='Reviews']",
    "[data-tab-index='1']",
    "button[jsaction*='reviews']",
    "[role='tab'][data-tab-index='1']",
    "[role='img'][aria-label*='stars']",
];

// ── Status machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Pending,
    Running,
    Succeeded,
    /// Some sub-steps failed or were cancelled; partial data persisted.
    Partial,
    Failed,
    /// Preconditions unmet (empty store, disabled) — not an error.
    Skipped,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Succeeded => "succeeded",
            PipelineStatus::Partial => "partial",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct StepStats {
    harvested: usize,
    dropped: usize,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub name: &'static str,
    pub status: PipelineStatus,
    pub harvested: usize,
    pub dropped: usize,
    pub steps_ok: u32,
    pub steps_failed: u32,
    pub detail: Option<String>,
}

impl PipelineReport {
    fn running(name: &'static str) -> Self {
        Self {
            name,
            status: PipelineStatus::Running,
            harvested: 0,
            dropped: 0,
            steps_ok: 0,
            steps_failed: 0,
            detail: None,
        }
    }

    fn skipped(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            detail: Some(reason.into()),
            status: PipelineStatus::Skipped,
            ..Self::running(name)
        }
    }

    fn failed(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            detail: Some(reason.into()),
            status: PipelineStatus::Failed,
            ..Self::running(name)
        }
    }

    /// Fold one sub-step outcome in. Only a fatal (connection) error is
    /// handed back to abort the pipeline.
    fn step(&mut self, step: &str, result: Result<StepStats>) -> Result<()> {
        match result {
            Ok(stats) => {
                self.steps_ok += 1;
                self.harvested += stats.harvested;
                self.dropped += stats.dropped;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("{}: step `{}` failed: {}", self.name, step, e);
                self.steps_failed += 1;
                Ok(())
            }
        }
    }

    fn finish(mut self) -> Self {
        self.status = if self.steps_failed == 0 {
            PipelineStatus::Succeeded
        } else if self.steps_ok == 0 {
            PipelineStatus::Failed
        } else {
            PipelineStatus::Partial
        };
        self
    }

    fn finish_cancelled(mut self) -> Self {
        self.status = if self.steps_ok > 0 {
            PipelineStatus::Partial
        } else {
            PipelineStatus::Skipped
        };
        self.detail = Some("cancelled".into());
        self
    }

    fn fail(mut self, e: ScoutError) -> Self {
        self.status = PipelineStatus::Failed;
        self.detail = Some(e.to_string());
        self
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub reports: Vec<PipelineReport>,
}

impl RunSummary {
    /// Zero iff every pipeline ended succeeded, partial, or skipped.
    pub fn exit_code(&self) -> i32 {
        let any_failed = self
            .reports
            .iter()
            .any(|r| r.status == PipelineStatus::Failed);
        if any_failed {
            1
        } else {
            0
        }
    }

    pub fn log(&self) {
        info!("── run summary ─────────────────────────────");
        for r in &self.reports {
            info!(
                "{:<10} {:<10} harvested={:<5} dropped={:<4} steps={}+{}{}",
                r.name,
                r.status.as_str(),
                r.harvested,
                r.dropped,
                r.steps_ok,
                r.steps_failed,
                r.detail
                    .as_deref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default()
            );
        }
    }
}

// ── Pipeline selection ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    Semrush,
    Traffic,
    Reviews,
    Sentiment,
}

impl PipelineKind {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::Semrush => "semrush",
            PipelineKind::Traffic => "traffic",
            PipelineKind::Reviews => "reviews",
            PipelineKind::Sentiment => "sentiment",
        }
    }

    pub fn needs_browser(&self) -> bool {
        !matches!(self, PipelineKind::Sentiment)
    }

    /// The `all` ordering, filtered by the config toggles. Sentiment is last
    /// so it sees the reviews harvested in the same run.
    pub fn enabled(settings: &Settings) -> Vec<PipelineKind> {
        let t = &settings.pipelines;
        [
            (PipelineKind::Semrush, t.semrush),
            (PipelineKind::Traffic, t.traffic),
            (PipelineKind::Reviews, t.reviews),
            (PipelineKind::Sentiment, t.sentiment),
        ]
        .into_iter()
        .filter_map(|(kind, on)| on.then_some(kind))
        .collect()
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

pub struct Orchestrator {
    settings: Settings,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(settings: Settings, cancel: Arc<AtomicBool>) -> Self {
        Self { settings, cancel }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Run the requested pipelines in order. The browser session is attached
    /// once and shared; if the attach fails, browser-bound pipelines are
    /// marked failed and `sentiment` still runs on stored data.
    pub async fn run(&self, kinds: &[PipelineKind]) -> RunSummary {
        let mut session: Option<Session> = None;
        let mut attach_error: Option<String> = None;
        if kinds.iter().any(|k| k.needs_browser()) {
            match Session::attach(&self.settings).await {
                Ok(s) => session = Some(s),
                Err(e) => {
                    error!("{}", e);
                    attach_error = Some(e.to_string());
                }
            }
        }

        let mut reports = Vec::with_capacity(kinds.len());
        for kind in kinds {
            if self.cancelled() {
                reports.push(PipelineReport::skipped(kind.name(), "cancelled"));
                continue;
            }
            info!("▶ pipeline {}", kind.name());
            let report = match (kind, session.as_mut()) {
                (PipelineKind::Sentiment, _) => self.run_sentiment().await,
                (PipelineKind::Semrush, Some(s)) => self.run_semrush(s).await,
                (PipelineKind::Traffic, Some(s)) => self.run_traffic(s).await,
                (PipelineKind::Reviews, Some(s)) => self.run_reviews(s).await,
                (kind, None) => PipelineReport::failed(
                    kind.name(),
                    attach_error
                        .clone()
                        .unwrap_or_else(|| "browser unavailable".into()),
                ),
            };
            info!("■ pipeline {} → {}", report.name, report.status.as_str());
            reports.push(report);
        }

        if let Some(s) = session {
            s.close().await;
        }
        RunSummary { reports }
    }

    // ── semrush ──────────────────────────────────────────────────────────────

    async fn run_semrush(&self, session: &mut Session) -> PipelineReport {
        let mut report = PipelineReport::running("semrush");
        let bucket = capture_bucket(&Utc::now());
        let metrics = MetricStore::new(&self.settings.data_dir);
        let db = self.settings.semrush.database.clone();

        for domain in self.settings.all_domains() {
            if self.cancelled() {
                return report.finish_cancelled();
            }

            let outcome = self
                .scrape_surface(
                    session,
                    &urls::organic_positions(&db, &domain),
                    &KeywordExtractor::new(domain.clone()),
                    &metrics,
                    &domain,
                    &bucket,
                )
                .await
                .map(|(stats, _)| stats);
            if let Err(e) = report.step("keywords", outcome) {
                return report.fail(e);
            }

            let outcome = self
                .scrape_surface(
                    session,
                    &urls::backlinks(&domain),
                    &BacklinkExtractor::new(domain.clone()),
                    &metrics,
                    &domain,
                    &bucket,
                )
                .await
                .map(|(stats, _)| stats);
            if let Err(e) = report.step("backlinks", outcome) {
                return report.fail(e);
            }

            let outcome = self
                .capture_surface(
                    session,
                    &urls::organic_pages(&db, &domain),
                    "semrush",
                    "pages",
                    &domain,
                )
                .await;
            if let Err(e) = report.step("pages", outcome) {
                return report.fail(e);
            }
        }

        // Paid-media benchmarks: competitor ad footprint with CPCs, plus
        // product-listing-ads evidence, rolled up into one CPC summary.
        let mut paid_records = Vec::new();
        for competitor in &self.settings.competitors {
            if self.cancelled() {
                return report.finish_cancelled();
            }
            let domain = &competitor.domain;

            let outcome = self
                .scrape_surface(
                    session,
                    &urls::adwords_positions(&db, domain),
                    &PaidKeywordExtractor::new(domain.clone()),
                    &metrics,
                    domain,
                    &bucket,
                )
                .await
                .map(|(stats, records)| {
                    paid_records.extend(records);
                    stats
                });
            if let Err(e) = report.step("paid_keywords", outcome) {
                return report.fail(e);
            }

            let outcome = self
                .capture_surface(
                    session,
                    &urls::pla_positions(&db, domain),
                    "semrush",
                    "pla",
                    domain,
                )
                .await;
            if let Err(e) = report.step("pla", outcome) {
                return report.fail(e);
            }
        }
        if let Some(benchmark) = CpcBenchmark::from_records(&paid_records) {
            let outcome = metrics
                .write_bucket("paid_summary", "industry", &bucket, &benchmark)
                .await
                .map(|_| StepStats::default());
            if let Err(e) = report.step("paid_summary", outcome) {
                return report.fail(e);
            }
        }

        if !self.settings.competitors.is_empty() && !self.cancelled() {
            let competitor_domains: Vec<String> = self
                .settings
                .competitors
                .iter()
                .map(|c| c.domain.clone())
                .collect();
            let url = urls::keyword_gap(&db, &self.settings.target.domain, &competitor_domains);
            let outcome = self
                .capture_surface(
                    session,
                    &url,
                    "semrush",
                    "keyword_gap",
                    &self.settings.target.domain,
                )
                .await;
            if let Err(e) = report.step("keyword_gap", outcome) {
                return report.fail(e);
            }
        }

        for keyword in &self.settings.market_keywords {
            if self.cancelled() {
                return report.finish_cancelled();
            }
            for (step, url) in [
                ("keyword_magic", urls::keyword_magic(&db, keyword)),
                ("keyword_overview", urls::keyword_overview(&db, keyword)),
            ] {
                let outcome = self
                    .capture_surface(session, &url, "semrush", step, keyword)
                    .await;
                if let Err(e) = report.step(step, outcome) {
                    return report.fail(e);
                }
            }
        }

        report.finish()
    }

    /// Navigate, capture evidence, extract, persist one metric bucket.
    /// Returns the kept records so callers can aggregate across sub-steps.
    async fn scrape_surface<E>(
        &self,
        session: &mut Session,
        url: &str,
        extractor: &E,
        metrics: &MetricStore,
        domain: &str,
        bucket: &str,
    ) -> Result<(StepStats, Vec<E::Record>)>
    where
        E: Extract,
        E::Record: serde::Serialize,
    {
        session.navigate(url).await?;
        session.dismiss_popups().await;

        let dir = screenshot_dir(&self.settings.output_dir, "semrush", extractor.name());
        if let Err(e) = session.capture(None, &dir, domain).await {
            warn!("evidence screenshot failed (continuing): {}", e);
        }

        let snapshot = session.snapshot().await?;
        let (records, dropped) = partition_records(extractor.name(), extractor.extract(&snapshot));
        if records.is_empty() && dropped > 0 {
            return Err(ScoutError::extraction(
                extractor.name(),
                format!("no usable records for {}", domain),
            ));
        }
        if !records.is_empty() {
            metrics
                .write_bucket(extractor.name(), domain, bucket, &records)
                .await?;
        }
        let stats = StepStats {
            harvested: records.len(),
            dropped,
        };
        Ok((stats, records))
    }

    /// Navigate and screenshot only — surfaces we keep as visual evidence.
    async fn capture_surface(
        &self,
        session: &mut Session,
        url: &str,
        pipeline: &str,
        step: &str,
        name: &str,
    ) -> Result<StepStats> {
        session.navigate(url).await?;
        session.dismiss_popups().await;
        let dir = screenshot_dir(&self.settings.output_dir, pipeline, step);
        let safe: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        session.capture(None, &dir, &safe).await?;
        Ok(StepStats::default())
    }

    // ── traffic ──────────────────────────────────────────────────────────────

    async fn run_traffic(&self, session: &mut Session) -> PipelineReport {
        let mut report = PipelineReport::running("traffic");
        let bucket = capture_bucket(&Utc::now());
        let metrics = MetricStore::new(&self.settings.data_dir);

        for domain in self.settings.all_domains() {
            if self.cancelled() {
                return report.finish_cancelled();
            }

            let outcome = self
                .scrape_surface(
                    session,
                    &urls::traffic_overview(&domain),
                    &TrafficExtractor::new(domain.clone()),
                    &metrics,
                    &domain,
                    &bucket,
                )
                .await
                .map(|(stats, _)| stats);
            if let Err(e) = report.step("overview", outcome) {
                return report.fail(e);
            }

            for (step, url) in [
                ("sources", urls::traffic_sources(&domain)),
                ("journey", urls::traffic_journey(&domain)),
            ] {
                let outcome = self
                    .capture_surface(session, &url, "traffic", step, &domain)
                    .await;
                if let Err(e) = report.step(step, outcome) {
                    return report.fail(e);
                }
            }
        }

        report.finish()
    }

    // ── reviews ──────────────────────────────────────────────────────────────

    async fn run_reviews(&self, session: &mut Session) -> PipelineReport {
        let mut report = PipelineReport::running("reviews");
        let store = ReviewStore::new(&self.settings.data_dir);
        let harvester = ScrollHarvester::from_settings(&self.settings.reviews);

        for query in self.review_queries() {
            if self.cancelled() {
                return report.finish_cancelled();
            }
            let outcome = self
                .harvest_location(session, &store, &harvester, &query)
                .await;
            if let Err(e) = report.step(&query, outcome) {
                return report.fail(e);
            }
        }

        report.finish()
    }

    /// One Maps search query per business name × store type × location.
    fn review_queries(&self) -> Vec<String> {
        let names = std::iter::once(&self.settings.target)
            .chain(self.settings.competitors.iter())
            .map(|i| i.name.as_str());
        let store_types: Vec<&str> = if self.settings.reviews.store_types.is_empty() {
            vec![""]
        } else {
            self.settings
                .reviews
                .store_types
                .iter()
                .map(|s| s.as_str())
                .collect()
        };

        let mut queries = Vec::new();
        for name in names {
            for store_type in &store_types {
                for location in &self.settings.reviews.locations {
                    let query = [name, store_type, location]
                        .iter()
                        .filter(|s| !s.is_empty())
                        .copied()
                        .collect::<Vec<_>>()
                        .join(" ");
                    queries.push(query);
                }
            }
        }
        queries
    }

    async fn harvest_location(
        &self,
        session: &mut Session,
        store: &ReviewStore,
        harvester: &ScrollHarvester,
        query: &str,
    ) -> Result<StepStats> {
        info!("🔍 {}", query);
        session.navigate(&urls::maps_search(query)).await?;
        session.dismiss_popups().await;

        // A direct-hit search lands on the place page; a list result needs a
        // click-through first.
        if session.click_first(RESULT_SELECTORS).await? {
            tokio::time::sleep(std::time::Duration::from_millis(
                self.settings.reviews.scroll_settle_ms,
            ))
            .await;
        }
        if !session.click_first(REVIEW_TAB_SELECTORS).await? {
            warn!("reviews tab not found for `{}`, reading current pane", query);
        }

        let extractor = ReviewExtractor::new(query, self.settings.reviews.min_text_len);
        let mut feed = SessionFeed::new(session, self.settings.reviews.scroll_settle_ms);
        let outcome = harvester.run(&mut feed, &extractor, &self.cancel).await;

        let merged = store.merge(&outcome.records).await?;
        info!(
            "✅ `{}`: {} harvested, {} new, {} dropped ({} cycles)",
            query,
            outcome.records.len(),
            merged.added,
            outcome.dropped,
            outcome.cycles_run
        );
        Ok(StepStats {
            harvested: merged.added,
            dropped: outcome.dropped,
        })
    }

    // ── sentiment ────────────────────────────────────────────────────────────

    async fn run_sentiment(&self) -> PipelineReport {
        let report = PipelineReport::running("sentiment");
        let store = ReviewStore::new(&self.settings.data_dir);
        let reviews = match store.load().await {
            Ok(reviews) => reviews,
            Err(e) => return report.fail(e),
        };
        if reviews.is_empty() {
            return PipelineReport::skipped("sentiment", "review store is empty");
        }

        let output = match crate::analysis::build_report(
            &reviews,
            &self.settings.analysis,
            Utc::now(),
        ) {
            Ok(output) => output,
            Err(ScoutError::Skipped(reason)) => {
                return PipelineReport::skipped("sentiment", reason)
            }
            Err(e) => return report.fail(e),
        };

        let analysis = AnalysisStore::new(&self.settings.output_dir);
        if let Err(e) = analysis.write_report(&output.report).await {
            return report.fail(e);
        }
        if let Err(e) = analysis.write_negative_reviews(&output.negative).await {
            return report.fail(e);
        }

        let mut report = report;
        report.harvested = output.report.n_reviews;
        report.steps_ok = 1;
        match output.topics_skipped {
            Some(reason) => {
                report.status = PipelineStatus::Partial;
                report.detail = Some(format!("topics skipped: {}", reason));
            }
            None => report.status = PipelineStatus::Succeeded,
        }
        report
    }
}
