//! Shared browser lifecycle and per-request page handles.
//!
//! One headless Chrome process is launched lazily on first use and reused for
//! the remainder of the process lifetime; the cold start is expensive enough
//! that it is never torn down between requests. Each scrape borrows the
//! browser and opens its own tab behind [`TabGuard`], which closes the tab on
//! drop regardless of how the scrape exits.

use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// Owns the shared browser process. `acquire` starts it on first use; racing
/// first callers are serialized by the cell so only one launch ever happens.
pub struct BrowserManager {
    config: ScraperConfig,
    browser: OnceCell<Arc<Browser>>,
}

impl BrowserManager {
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: OnceCell::new(),
        }
    }

    /// Returns the shared browser handle, launching the process if this is
    /// the first caller. The manager never closes the browser itself.
    pub async fn acquire(&self) -> Result<Arc<Browser>> {
        self.browser
            .get_or_try_init(|| async {
                let config = self.config.clone();
                info!("Launching shared headless browser");
                let browser = tokio::task::spawn_blocking(move || launch_browser(&config))
                    .await
                    .map_err(|e| AppError::Browser(format!("Browser launch task panicked: {e}")))??;
                info!("Browser is ready and will be reused for subsequent requests");
                Ok::<_, AppError>(Arc::new(browser))
            })
            .await
            .cloned()
    }
}

fn launch_browser(config: &ScraperConfig) -> Result<Browser> {
    let mut launch_options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false) // Often needed in containerized environments
        .idle_browser_timeout(Duration::from_secs(config.browser_idle_timeout))
        .args(vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-extensions"),
        ])
        .build()
        .map_err(|e| AppError::Browser(format!("Failed to create launch options: {e}")))?;

    if let Some(chrome_path) = &config.chrome_path {
        launch_options.path = Some(std::path::PathBuf::from(chrome_path));
    }

    Browser::new(launch_options).map_err(|e| AppError::Browser(format!("Failed to launch browser: {e}")))
}

/// A per-request tab, closed exactly once when the guard drops. Never shared
/// across requests.
pub struct TabGuard {
    tab: Arc<Tab>,
}

impl TabGuard {
    /// Opens a fresh tab configured for scraping: page-load timeout applied,
    /// user agent set, and static resources blocked when enabled.
    pub fn open(browser: &Browser, config: &ScraperConfig) -> Result<Self> {
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Browser(format!("Failed to open page: {e}")))?;

        tab.set_default_timeout(config.page_load());

        if let Err(e) = tab.set_user_agent(&config.user_agent, None, None) {
            warn!(error = %e, "Failed to set user agent, continuing with the default");
        }

        if config.block_static_resources {
            // Bandwidth optimization only; a failure here must not fail the scrape.
            if let Err(e) = block_static_resources(&tab) {
                warn!(error = %e, "Failed to enable resource blocking, continuing without it");
            }
        }

        Ok(Self { tab })
    }
}

impl Deref for TabGuard {
    type Target = Tab;

    fn deref(&self) -> &Tab {
        &self.tab
    }
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        match self.tab.close(true) {
            Ok(_) => debug!("Page closed, browser remains open for new requests"),
            Err(e) => debug!(error = %e, "Page close failed (tab may already be gone)"),
        }
    }
}

struct StaticResourceBlocker;

impl RequestInterceptor for StaticResourceBlocker {
    fn intercept(
        &self,
        _transport: Arc<Transport>,
        _session_id: SessionId,
        event: RequestPausedEvent,
    ) -> RequestPausedDecision {
        match event.params.resource_Type {
            ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font => {
                RequestPausedDecision::Fail(FailRequest {
                    request_id: event.params.request_id,
                    error_reason: ErrorReason::BlockedByClient,
                })
            }
            _ => RequestPausedDecision::Continue(None),
        }
    }
}

fn block_static_resources(tab: &Arc<Tab>) -> anyhow::Result<()> {
    let patterns: Vec<RequestPattern> = [ResourceType::Image, ResourceType::Stylesheet, ResourceType::Font]
        .into_iter()
        .map(|resource_type| RequestPattern {
            url_pattern: None,
            resource_Type: Some(resource_type),
            request_stage: Some(RequestStage::Request),
        })
        .collect();

    tab.enable_fetch(Some(&patterns), None)?;
    tab.enable_request_interception(Arc::new(StaticResourceBlocker))?;
    Ok(())
}

/// Cooperative cancellation for an in-flight scrape. Every bounded wait in
/// the pipeline checks the token between polls, so a dropped caller stops
/// the scrape at the next poll instead of running each step to its timeout.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Guard that cancels the token when dropped. Held by the async side of
    /// a scrape so that dropping the request future cancels the blocking
    /// pipeline.
    pub fn drop_guard(self) -> CancelOnDrop {
        CancelOnDrop { token: self }
    }
}

pub struct CancelOnDrop {
    token: CancelToken,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> ScraperConfig {
        ScraperConfig {
            user_agent: "TestAgent/1.0".to_string(),
            chrome_path: None,
            browser_idle_timeout: 60,
            page_load_timeout: 10,
            card_lookup_timeout: 2,
            details_timeout: 2,
            award_settle_timeout: 2,
            poll_interval_ms: 100,
            block_static_resources: false,
        }
    }

    #[test]
    fn test_cancel_token_starts_active() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert!(token.ensure_active().is_ok());
    }

    #[test]
    fn test_cancel_token_propagates_to_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.ensure_active(), Err(AppError::Cancelled)));
    }

    #[test]
    fn test_drop_guard_cancels() {
        let token = CancelToken::new();
        {
            let _guard = token.clone().drop_guard();
            assert!(!token.is_cancelled());
        }
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_starts_one_browser() {
        // Requires a local Chrome; skipped gracefully in environments without one.
        let manager = Arc::new(BrowserManager::new(get_test_config()));

        let a = Arc::clone(&manager);
        let b = Arc::clone(&manager);
        let (first, second) = tokio::join!(a.acquire(), b.acquire());

        match (first, second) {
            (Ok(first), Ok(second)) => {
                assert!(Arc::ptr_eq(&first, &second), "both callers must share one browser");
            }
            (Err(e), _) | (_, Err(e)) => {
                println!("Skipping test - Chrome not available: {e}");
            }
        }
    }
}
