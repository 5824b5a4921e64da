//! Incremental scroll harvesting for unbounded, continuously-loading lists.
//!
//! The source page has no reliable end-of-list signal, so termination is a
//! policy, not an observation: stop after `stale_cycle_limit` consecutive
//! cycles with zero new records, or unconditionally at the `max_cycles`
//! ceiling. The accumulated set only ever grows, keyed by each record's
//! content-derived key.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::core::config::ReviewSettings;
use crate::core::error::Result;
use crate::core::types::RecordKey;
use crate::extract::{partition_records, Extract, PageSnapshot};
use crate::session::Session;

/// Scroll containers for the reviews pane, newest selector generation first.
const REVIEW_FEED_SELECTORS: &[&str] = &[
    "[role='feed']",
    ".m6QErb.DxyBCb",
    "[class*='review-dialog-list']",
    "div[tabindex='-1']",
];

/// The harvester's view of a live page: take a snapshot, trigger the next
/// load. Split out as a seam so the loop is testable on scripted snapshots.
#[async_trait]
pub trait PageFeed {
    async fn snapshot(&mut self) -> Result<PageSnapshot>;
    /// Trigger the scroll / "load more" action for the next cycle.
    async fn advance(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stale_cycle_limit` consecutive cycles produced nothing new.
    Stale,
    /// Hard cycle ceiling reached.
    Ceiling,
    /// Cancellation flag was set between cycles.
    Cancelled,
}

#[derive(Debug)]
pub struct HarvestOutcome<R> {
    pub records: Vec<R>,
    pub cycles_run: u32,
    pub dropped: usize,
    pub skipped_cycles: u32,
    pub stopped_by: StopReason,
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollHarvester {
    pub stale_cycle_limit: u32,
    pub max_cycles: u32,
}

impl ScrollHarvester {
    pub fn from_settings(s: &ReviewSettings) -> Self {
        Self {
            stale_cycle_limit: s.stale_cycle_limit.max(1),
            max_cycles: s.max_scroll_count.max(1),
        }
    }

    /// Run extract-then-scroll cycles until the termination policy fires.
    ///
    /// Per-cycle fault policy: a failed snapshot is retried once, then the
    /// cycle is skipped with a warning — one bad cycle never aborts the
    /// harvest. Cancellation is honored between cycles only and never
    /// discards accumulated records.
    pub async fn run<F, E>(
        &self,
        feed: &mut F,
        extractor: &E,
        cancel: &AtomicBool,
    ) -> HarvestOutcome<E::Record>
    where
        F: PageFeed + Send,
        E: Extract,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut records: Vec<E::Record> = Vec::new();
        let mut stale = 0u32;
        let mut cycles = 0u32;
        let mut dropped = 0usize;
        let mut skipped = 0u32;

        let stopped_by = loop {
            if cancel.load(Ordering::Relaxed) {
                info!("harvest cancelled after {} cycle(s)", cycles);
                break StopReason::Cancelled;
            }
            cycles += 1;

            match self.snapshot_with_retry(feed).await {
                Ok(snapshot) => {
                    let (batch, drop_n) =
                        partition_records(extractor.name(), extractor.extract(&snapshot));
                    dropped += drop_n;

                    let mut new_count = 0usize;
                    for record in batch {
                        if seen.insert(record.record_key()) {
                            records.push(record);
                            new_count += 1;
                        }
                    }
                    if new_count == 0 {
                        stale += 1;
                    } else {
                        stale = 0;
                    }
                    debug!(
                        "cycle {}/{}: {} new, {} total, stale={}",
                        cycles,
                        self.max_cycles,
                        new_count,
                        records.len(),
                        stale
                    );

                    if stale >= self.stale_cycle_limit {
                        info!(
                            "harvest settled: {} stale cycle(s) in a row ({} records)",
                            stale,
                            records.len()
                        );
                        break StopReason::Stale;
                    }
                }
                Err(e) => {
                    // A skipped cycle says nothing about staleness; it only
                    // burns ceiling budget.
                    skipped += 1;
                    warn!("cycle {} skipped after retry: {}", cycles, e);
                }
            }

            if cycles >= self.max_cycles {
                info!(
                    "harvest hit cycle ceiling {} ({} records)",
                    self.max_cycles,
                    records.len()
                );
                break StopReason::Ceiling;
            }

            if let Err(e) = feed.advance().await {
                warn!("scroll action failed, retrying once: {}", e);
                if let Err(e) = feed.advance().await {
                    warn!("scroll retry failed, continuing with current view: {}", e);
                }
            }
        };

        HarvestOutcome {
            records,
            cycles_run: cycles,
            dropped,
            skipped_cycles: skipped,
            stopped_by,
        }
    }

    async fn snapshot_with_retry<F: PageFeed + Send>(&self, feed: &mut F) -> Result<PageSnapshot> {
        match feed.snapshot().await {
            Ok(s) => Ok(s),
            Err(first) => {
                warn!("snapshot failed, retrying once: {}", first);
                feed.snapshot().await
            }
        }
    }
}

/// Live `PageFeed` over the attached session's reviews pane.
pub struct SessionFeed<'a> {
    session: &'a mut Session,
    settle: Duration,
    window_offset: u32,
}

impl<'a> SessionFeed<'a> {
    pub fn new(session: &'a mut Session, settle_ms: u64) -> Self {
        Self {
            session,
            settle: Duration::from_millis(settle_ms),
            window_offset: 0,
        }
    }
}

#[async_trait]
impl PageFeed for SessionFeed<'_> {
    async fn snapshot(&mut self) -> Result<PageSnapshot> {
        self.session.snapshot().await
    }

    async fn advance(&mut self) -> Result<()> {
        let scrolled = self.session.scroll_feed(REVIEW_FEED_SELECTORS).await?;
        if !scrolled {
            // No dedicated feed container — fall back to scrolling the window.
            self.window_offset += 600;
            self.session.scroll_window(self.window_offset).await?;
        }
        self.session.expand_truncated().await;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ScoutError;

    /// Record keyed by its own content.
    #[derive(Debug, Clone, PartialEq)]
    struct Item(String);
    impl RecordKey for Item {
        fn record_key(&self) -> String {
            self.0.clone()
        }
    }

    /// Parses snapshots whose html is a comma-separated id list.
    struct IdListExtractor;
    impl Extract for IdListExtractor {
        type Record = Item;
        fn name(&self) -> &'static str {
            "idlist"
        }
        fn extract(&self, snapshot: &PageSnapshot) -> Vec<Result<Item>> {
            snapshot
                .html
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| {
                    if s.trim() == "bad" {
                        Err(ScoutError::extraction("idlist", "unparseable id"))
                    } else {
                        Ok(Item(s.trim().to_string()))
                    }
                })
                .collect()
        }
    }

    /// Scripted feed: one html string per cycle; the last repeats forever.
    /// `None` entries fail the snapshot (to exercise retry/skip).
    struct ScriptedFeed {
        pages: Vec<Option<String>>,
        cursor: usize,
        advances: u32,
    }
    impl ScriptedFeed {
        fn new(pages: Vec<Option<&str>>) -> Self {
            Self {
                pages: pages.into_iter().map(|p| p.map(str::to_string)).collect(),
                cursor: 0,
                advances: 0,
            }
        }
    }
    #[async_trait]
    impl PageFeed for ScriptedFeed {
        async fn snapshot(&mut self) -> Result<PageSnapshot> {
            let idx = self.cursor.min(self.pages.len().saturating_sub(1));
            match &self.pages[idx] {
                Some(html) => Ok(PageSnapshot::new("scripted", html.clone())),
                None => Err(ScoutError::extraction("idlist", "transient DOM mutation")),
            }
        }
        async fn advance(&mut self) -> Result<()> {
            self.advances += 1;
            self.cursor += 1;
            Ok(())
        }
    }

    fn harvester(stale: u32, ceiling: u32) -> ScrollHarvester {
        ScrollHarvester {
            stale_cycle_limit: stale,
            max_cycles: ceiling,
        }
    }

    #[tokio::test]
    async fn accumulates_and_dedups_across_cycles() {
        let mut feed = ScriptedFeed::new(vec![
            Some("a,b"),
            Some("a,b,c"), // b,a repeat; c new
            Some("a,b,c"),
        ]);
        let cancel = AtomicBool::new(false);
        let out = harvester(3, 15)
            .run(&mut feed, &IdListExtractor, &cancel)
            .await;
        let ids: Vec<&str> = out.records.iter().map(|i| i.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(out.stopped_by, StopReason::Stale);
    }

    #[tokio::test]
    async fn harvesting_same_sequence_twice_yields_same_set_size() {
        let pages = vec![Some("a,b"), Some("b,c"), Some("c")];
        let cancel = AtomicBool::new(false);
        let h = harvester(3, 15);

        let mut feed1 = ScriptedFeed::new(pages.clone());
        let once = h.run(&mut feed1, &IdListExtractor, &cancel).await;
        let mut feed2 = ScriptedFeed::new(pages);
        let twice = h.run(&mut feed2, &IdListExtractor, &cancel).await;

        assert_eq!(once.records.len(), 3);
        assert_eq!(once.records.len(), twice.records.len());
    }

    #[tokio::test]
    async fn three_empty_cycles_stop_exactly_at_the_threshold() {
        // No new records on any cycle, stale limit 3: exactly 3 extraction
        // cycles, and no scroll beyond cycle 3.
        let mut feed = ScriptedFeed::new(vec![Some("")]);
        let cancel = AtomicBool::new(false);
        let out = harvester(3, 15)
            .run(&mut feed, &IdListExtractor, &cancel)
            .await;
        assert_eq!(out.cycles_run, 3);
        assert_eq!(feed.advances, 2); // between cycles only, none after the stop
        assert_eq!(out.stopped_by, StopReason::Stale);
        assert!(out.records.is_empty());
    }

    #[tokio::test]
    async fn ceiling_is_absolute_even_with_endless_new_records() {
        // Every cycle yields a brand-new id; only the ceiling can stop it.
        struct EndlessFeed {
            n: u32,
        }
        #[async_trait]
        impl PageFeed for EndlessFeed {
            async fn snapshot(&mut self) -> Result<PageSnapshot> {
                Ok(PageSnapshot::new("endless", format!("id{}", self.n)))
            }
            async fn advance(&mut self) -> Result<()> {
                self.n += 1;
                Ok(())
            }
        }
        let mut feed = EndlessFeed { n: 0 };
        let cancel = AtomicBool::new(false);
        let out = harvester(3, 8)
            .run(&mut feed, &IdListExtractor, &cancel)
            .await;
        assert_eq!(out.cycles_run, 8);
        assert_eq!(out.stopped_by, StopReason::Ceiling);
        assert_eq!(out.records.len(), 8);
    }

    #[tokio::test]
    async fn failed_cycle_is_skipped_not_fatal() {
        // Cycle 2 fails the snapshot twice (initial + retry) and is skipped;
        // harvesting continues and still picks up cycle 3's new record.
        let mut feed = ScriptedFeed::new(vec![Some("a"), None, Some("a,b"), Some("a,b")]);
        let cancel = AtomicBool::new(false);
        let out = harvester(3, 15)
            .run(&mut feed, &IdListExtractor, &cancel)
            .await;
        assert_eq!(out.skipped_cycles, 1);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.stopped_by, StopReason::Stale);
    }

    #[tokio::test]
    async fn malformed_records_are_dropped_and_counted() {
        let mut feed = ScriptedFeed::new(vec![Some("a,bad,b")]);
        let cancel = AtomicBool::new(false);
        let out = harvester(1, 15)
            .run(&mut feed, &IdListExtractor, &cancel)
            .await;
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.dropped, 1);
    }

    #[tokio::test]
    async fn pre_set_cancellation_stops_before_the_first_cycle() {
        let mut feed = ScriptedFeed::new(vec![Some("a,b")]);
        let cancel = AtomicBool::new(false);
        cancel.store(true, Ordering::Relaxed);
        let out = harvester(3, 15)
            .run(&mut feed, &IdListExtractor, &cancel)
            .await;
        assert_eq!(out.cycles_run, 0);
        assert_eq!(out.stopped_by, StopReason::Cancelled);
    }

    #[tokio::test]
    async fn cancellation_after_productive_cycles_keeps_their_records() {
        // The flag is raised while the second scroll settles; the loop must
        // stop before cycle 3 and return everything gathered so far.
        struct CancellingFeed<'a> {
            cancel: &'a AtomicBool,
            n: u32,
        }
        #[async_trait]
        impl PageFeed for CancellingFeed<'_> {
            async fn snapshot(&mut self) -> Result<PageSnapshot> {
                Ok(PageSnapshot::new("cancelling", format!("id{}", self.n)))
            }
            async fn advance(&mut self) -> Result<()> {
                self.n += 1;
                if self.n == 2 {
                    self.cancel.store(true, Ordering::Relaxed);
                }
                Ok(())
            }
        }

        let cancel = AtomicBool::new(false);
        let mut feed = CancellingFeed {
            cancel: &cancel,
            n: 0,
        };
        let out = harvester(3, 15)
            .run(&mut feed, &IdListExtractor, &cancel)
            .await;

        assert_eq!(out.cycles_run, 2);
        assert_eq!(out.stopped_by, StopReason::Cancelled);
        let ids: Vec<&str> = out.records.iter().map(|i| i.0.as_str()).collect();
        assert_eq!(ids, vec!["id0", "id1"]);
    }
}
