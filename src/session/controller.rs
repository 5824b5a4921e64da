use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use chrono::Utc;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::config::{NavigationSettings, Settings};
use crate::core::error::{Result, ScoutError};
use crate::extract::PageSnapshot;
use crate::session::retry::RetryPolicy;
use crate::store;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const ATTACH_TIMEOUT: Duration = Duration::from_secs(10);

/// Modal overlays that sit on top of the surfaces we capture.
const POPUP_CLOSE_SELECTORS: &[&str] = &[
    "[aria-label='Close']",
    ".modal-close",
    "button[class*='close']",
    "[data-test='modal-close']",
];

/// A singly-owned handle to the attached browser.
///
/// Scoped acquisition/release: the orchestrator attaches once per run and the
/// session closes on drop of the run scope. Every operation is bounded by a
/// timeout and surfaces a typed, recoverable error — the browser is treated
/// as an untrusted, slow, possibly-already-broken peer.
pub struct Session {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Option<Page>,
    endpoint: String,
    nav: NavigationSettings,
    retry: RetryPolicy,
}

impl Session {
    /// Attach to the remote-debugging endpoint from the settings.
    ///
    /// Resolves the WebSocket debugger URL via `GET /json/version`, then
    /// connects over CDP. Both steps are bounded; failure is a
    /// `ConnectionError` and is never retried beyond this one budget.
    pub async fn attach(settings: &Settings) -> Result<Self> {
        let endpoint = settings.debug_endpoint();
        info!("🔌 attaching to browser at {}", endpoint);

        let ws_url = resolve_ws_url(&endpoint).await?;
        debug!("debugger websocket: {}", ws_url);

        let connect = tokio::time::timeout(ATTACH_TIMEOUT, Browser::connect(ws_url));
        let (browser, mut handler) = match connect.await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                return Err(ScoutError::Connection {
                    endpoint,
                    reason: format!("CDP connect failed: {}", e),
                })
            }
            Err(_) => {
                return Err(ScoutError::Connection {
                    endpoint,
                    reason: format!("CDP connect timed out after {:?}", ATTACH_TIMEOUT),
                })
            }
        };

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!("CDP handler error: {}", e);
                }
            }
        });

        info!("✅ attached to {}", endpoint);
        Ok(Self {
            browser,
            handler_task,
            page: None,
            endpoint,
            nav: settings.navigation.clone(),
            retry: RetryPolicy::from_settings(&settings.retry),
        })
    }

    /// Navigate the session's single page to `url` and wait for it to settle.
    ///
    /// Idempotent: every call reuses the same tab, so repeated navigation to
    /// the same URL accumulates no browser state. Retried under the backoff
    /// policy; exhaustion surfaces a `NavigationError`.
    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        let mut last_err = String::from("no attempt made");
        for attempt in 1..=self.retry.max_attempts {
            match self.navigate_once(url).await {
                Ok(()) => {
                    debug!("navigated to {} (attempt {})", url, attempt);
                    return Ok(());
                }
                Err(e) => {
                    last_err = e;
                    warn!(
                        "navigation attempt {}/{} to {} failed: {}",
                        attempt, self.retry.max_attempts, url, last_err
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.jittered_delay(attempt)).await;
                    }
                }
            }
        }
        Err(ScoutError::Navigation {
            url: url.to_string(),
            attempts: self.retry.max_attempts,
            reason: last_err,
        })
    }

    async fn navigate_once(&mut self, url: &str) -> std::result::Result<(), String> {
        let page = self.ensure_page().await?;
        page.goto(url).await.map_err(|e| format!("goto: {}", e))?;
        self.wait_until_ready(&page).await
    }

    async fn ensure_page(&mut self) -> std::result::Result<Page, String> {
        if let Some(page) = &self.page {
            return Ok(page.clone());
        }
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("failed to open tab: {}", e))?;
        self.page = Some(page.clone());
        Ok(page)
    }

    /// Wait until `document.readyState == "complete"` and the resource count
    /// has been quiet for `settle_quiet_ms`, or the ready timeout elapses.
    /// A page that reached `complete` but never goes network-quiet is accepted;
    /// a page that never completes within the timeout is an error.
    async fn wait_until_ready(&self, page: &Page) -> std::result::Result<(), String> {
        let timeout = Duration::from_millis(self.nav.ready_timeout_ms);
        let quiet = Duration::from_millis(self.nav.settle_quiet_ms);
        let start = Instant::now();
        let mut last_count: u64 = 0;
        let mut stable_since = Instant::now();
        let mut complete = false;

        loop {
            if start.elapsed() >= timeout {
                return if complete {
                    debug!("settle timeout after {:?}, page complete — accepting", timeout);
                    Ok(())
                } else {
                    Err(format!("page never reached readyState=complete within {:?}", timeout))
                };
            }

            complete = page
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|v| v.into_value::<String>().ok())
                .map(|s| s == "complete")
                .unwrap_or(false);

            let count: u64 = page
                .evaluate("performance.getEntriesByType('resource').length")
                .await
                .ok()
                .and_then(|v| v.into_value::<serde_json::Value>().ok())
                .and_then(|j| j.as_u64())
                .unwrap_or(0);

            if !complete || count != last_count {
                last_count = count;
                stable_since = Instant::now();
            } else if stable_since.elapsed() >= quiet {
                debug!(
                    "page settled after {:?} ({} resources)",
                    start.elapsed(),
                    count
                );
                return Ok(());
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Screenshot the page (or just `region_selector` when given) into
    /// `save_dir/name_<timestamp>.png`, written atomically. The region must
    /// become visible within the ready timeout; retried under the backoff
    /// policy, exhaustion surfaces a `CaptureError`.
    pub async fn capture(
        &mut self,
        region_selector: Option<&str>,
        save_dir: &Path,
        name: &str,
    ) -> Result<PathBuf> {
        let target = region_selector.unwrap_or("viewport").to_string();
        let mut last_err = String::from("no attempt made");
        for attempt in 1..=self.retry.max_attempts {
            match self.capture_once(region_selector).await {
                Ok(bytes) => {
                    let filename =
                        format!("{}_{}.png", name, Utc::now().format("%Y%m%d_%H%M%S"));
                    let path = save_dir.join(filename);
                    store::atomic_write(&path, &bytes).await?;
                    info!("📸 {}", path.display());
                    return Ok(path);
                }
                Err(e) => {
                    last_err = e;
                    warn!(
                        "capture attempt {}/{} of `{}` failed: {}",
                        attempt, self.retry.max_attempts, target, last_err
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.jittered_delay(attempt)).await;
                    }
                }
            }
        }
        Err(ScoutError::Capture {
            target,
            reason: last_err,
        })
    }

    async fn capture_once(
        &mut self,
        region_selector: Option<&str>,
    ) -> std::result::Result<Vec<u8>, String> {
        let page = self.ensure_page().await?;
        match region_selector {
            Some(selector) => {
                let timeout = Duration::from_millis(self.nav.ready_timeout_ms);
                let start = Instant::now();
                loop {
                    match page.find_element(selector).await {
                        Ok(element) => {
                            element.scroll_into_view().await.ok();
                            return element
                                .screenshot(CaptureScreenshotFormat::Png)
                                .await
                                .map_err(|e| format!("element screenshot: {}", e));
                        }
                        Err(_) if start.elapsed() < timeout => {
                            tokio::time::sleep(POLL_INTERVAL).await;
                        }
                        Err(e) => {
                            return Err(format!(
                                "region not visible within {:?}: {}",
                                timeout, e
                            ))
                        }
                    }
                }
            }
            None => page
                .screenshot(
                    ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .full_page(false)
                        .build(),
                )
                .await
                .map_err(|e| format!("page screenshot: {}", e)),
        }
    }

    /// Capture the currently rendered DOM as the snapshot extractors consume.
    pub async fn snapshot(&mut self) -> Result<PageSnapshot> {
        let page = self.ensure_page().await.map_err(|reason| ScoutError::Capture {
            target: "snapshot".into(),
            reason,
        })?;
        let html = page.content().await.map_err(|e| ScoutError::Capture {
            target: "snapshot".into(),
            reason: format!("content: {}", e),
        })?;
        let url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| "about:blank".to_string());
        Ok(PageSnapshot {
            url,
            html,
            captured_at: Utc::now(),
        })
    }

    /// Best-effort dismissal of modal overlays. Never fails the caller.
    pub async fn dismiss_popups(&mut self) {
        let Ok(page) = self.ensure_page().await else {
            return;
        };
        for selector in POPUP_CLOSE_SELECTORS {
            if let Ok(buttons) = page.find_elements(*selector).await {
                for button in buttons {
                    if button.click().await.is_ok() {
                        debug!("dismissed popup via {}", selector);
                        tokio::time::sleep(Duration::from_millis(300)).await;
                    }
                }
            }
        }
    }

    /// Click the first element matching any of `selectors`. Used for tab/panel
    /// activation where the UI ships several selector generations at once.
    pub async fn click_first(&mut self, selectors: &[&str]) -> Result<bool> {
        let page = self.ensure_page().await.map_err(|reason| ScoutError::Capture {
            target: "click".into(),
            reason,
        })?;
        for selector in selectors {
            if let Ok(element) = page.find_element(*selector).await {
                if element.click().await.is_ok() {
                    debug!("clicked {}", selector);
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Scroll the window down by `y` pixels (for long metric dashboards).
    pub async fn scroll_window(&mut self, y: u32) -> Result<()> {
        self.eval_void(&format!("window.scrollTo({{top: {y}, behavior: 'smooth'}});"))
            .await
    }

    /// Scroll a dedicated feed container to its bottom — the "load more"
    /// trigger on continuously-scrolling panes. Returns false when no
    /// container matched any selector.
    pub async fn scroll_feed(&mut self, selectors: &[&str]) -> Result<bool> {
        let page = self.ensure_page().await.map_err(|reason| ScoutError::Capture {
            target: "scroll".into(),
            reason,
        })?;
        for selector in selectors {
            // Selector constants may contain quotes; JSON-encode them into a
            // JS string literal instead of splicing raw.
            let sel_js = serde_json::to_string(selector)?;
            let script = format!(
                "(() => {{ const el = document.querySelector({sel_js}); \
                 if (!el) return false; el.scrollTop = el.scrollHeight; return true; }})()"
            );
            let scrolled = page
                .evaluate(script)
                .await
                .ok()
                .and_then(|v| v.into_value::<bool>().ok())
                .unwrap_or(false);
            if scrolled {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Expand truncated review bodies ("See more"). Best-effort.
    pub async fn expand_truncated(&mut self) {
        let Ok(page) = self.ensure_page().await else {
            return;
        };
        for selector in ["button[aria-label='See more']", "[class*='expand']"] {
            if let Ok(buttons) = page.find_elements(selector).await {
                for button in buttons {
                    if button.click().await.is_ok() {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    }
                }
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Release the session. Closes our tab but leaves the user's browser and
    /// login state untouched.
    pub async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("page close error (non-fatal): {}", e);
            }
        }
        // The browser belongs to the user — drop the transport, don't kill it.
        drop(self.browser);
        self.handler_task.abort();
        info!("🛑 session released ({})", self.endpoint);
    }

    async fn eval_void(&mut self, script: &str) -> Result<()> {
        let page = self.ensure_page().await.map_err(|reason| ScoutError::Capture {
            target: "evaluate".into(),
            reason,
        })?;
        page.evaluate(script.to_string())
            .await
            .map_err(|e| ScoutError::Capture {
                target: "evaluate".into(),
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

/// Resolve `ws://…` debugger URL from the HTTP endpoint's `/json/version`.
async fn resolve_ws_url(endpoint: &str) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(ATTACH_TIMEOUT)
        .build()
        .map_err(|e| ScoutError::Connection {
            endpoint: endpoint.to_string(),
            reason: format!("http client: {}", e),
        })?;

    let version_url = format!("http://{}/json/version", endpoint);
    let body: serde_json::Value = client
        .get(&version_url)
        .send()
        .await
        .map_err(|e| ScoutError::Connection {
            endpoint: endpoint.to_string(),
            reason: format!(
                "{} unreachable: {} (start Chrome with --remote-debugging-port)",
                version_url, e
            ),
        })?
        .json()
        .await
        .map_err(|e| ScoutError::Connection {
            endpoint: endpoint.to_string(),
            reason: format!("malformed /json/version response: {}", e),
        })?;

    body.get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ScoutError::Connection {
            endpoint: endpoint.to_string(),
            reason: "no webSocketDebuggerUrl in /json/version".to_string(),
        })
}
