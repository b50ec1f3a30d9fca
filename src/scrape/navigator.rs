//! State machine driving the portal to a tender's details page.
//!
//! Two paths reach `DetailsReady`: direct navigation when the caller handed
//! us a portal URL, and the search flow when they handed us a reference
//! number. Every wait is a bounded poll that also honors the request's
//! cancellation token, so an abandoned request stops at the next poll
//! instead of running each step to its timeout.

use scraper::{Html, Selector};
use std::time::Instant;
use tracing::{debug, error, info};
use url::Url;

use crate::browser::{CancelToken, TabGuard};
use crate::config::ScraperConfig;
use crate::models::SearchQuery;
use crate::portal;
use crate::scrape::deadline;
use crate::scrape::extractor::element_text;
use crate::utils::error::{AppError, Result};

/// Navigation phases, in the order a successful scrape passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    DirectNav,
    SearchFlow,
    CardLocated,
    DetailsReady,
    AwardTabCheck,
    Done,
    Failed,
}

/// What navigation hands to the extraction stages.
#[derive(Debug, Clone, PartialEq)]
pub struct NavOutcome {
    /// Resolved details-page URL.
    pub final_url: String,
    /// Deadline read off the result card; primary deadline source. Absent on
    /// the direct-URL path, which never sees a card.
    pub card_deadline: Option<String>,
}

/// Everything found on the matched result card.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CardInfo {
    pub deadline: Option<String>,
    pub details_href: Option<String>,
}

pub struct Navigator<'a> {
    tab: &'a TabGuard,
    config: &'a ScraperConfig,
    cancel: &'a CancelToken,
    phase: Phase,
}

impl<'a> Navigator<'a> {
    pub fn new(tab: &'a TabGuard, config: &'a ScraperConfig, cancel: &'a CancelToken) -> Self {
        Self {
            tab,
            config,
            cancel,
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn transition(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "Navigation transition");
        self.phase = next;
    }

    pub fn fail(&mut self, err: &AppError) {
        error!(phase = ?self.phase, error = %err, "Navigation failed");
        self.phase = Phase::Failed;
    }

    /// Drive the page to `DetailsReady`, or into `Failed` with the causing
    /// error propagated.
    pub fn run(&mut self, query: &SearchQuery) -> Result<NavOutcome> {
        let outcome = self.drive(query);
        if let Err(e) = &outcome {
            self.fail(e);
        }
        outcome
    }

    fn drive(&mut self, query: &SearchQuery) -> Result<NavOutcome> {
        let outcome = match query.url() {
            Some(url) => {
                self.transition(Phase::DirectNav);
                info!(url, "URL detected, navigating directly");
                self.navigate(url)?;
                NavOutcome {
                    final_url: url.to_string(),
                    card_deadline: None,
                }
            }
            None => {
                self.transition(Phase::SearchFlow);
                info!(reference = query.reference(), "Searching portal by reference number");
                let card = self.search_for_card(query.reference())?;
                self.transition(Phase::CardLocated);

                let details_url = self.resolve_details_url(&card)?;
                self.navigate(&details_url)?;
                NavOutcome {
                    final_url: details_url,
                    card_deadline: card.deadline,
                }
            }
        };

        self.wait_details_ready()?;
        self.transition(Phase::DetailsReady);
        Ok(outcome)
    }

    /// Run the listing search and return the card matching the reference.
    fn search_for_card(&mut self, reference: &str) -> Result<CardInfo> {
        self.navigate(portal::LISTING_URL)?;

        self.wait_for_element(portal::SEARCH_PANEL_TOGGLE, "open search panel")?
            .click()
            .map_err(|e| AppError::Extraction(format!("Failed to open search panel: {e}")))?;

        // The dates tab link sits under an overlay while the panel animates;
        // a DOM-level click is what reliably lands.
        self.wait_for_element(portal::DATES_TAB_LINK, "dates tab")?;
        self.eval(
            &format!("document.querySelector('{}').click()", portal::DATES_TAB_LINK),
            "switch to dates tab",
        )?;

        // Without the "any time" publish filter the portal hides tenders
        // outside a recent window.
        self.wait_for_element(portal::PUBLISH_DATE_SELECT, "publish date filter")?;
        self.eval(
            &format!(
                "(() => {{ const el = document.querySelector('{}'); el.value = '{}'; \
                 el.dispatchEvent(new Event('change', {{ bubbles: true }})); }})()",
                portal::PUBLISH_DATE_SELECT,
                portal::PUBLISH_DATE_ANY
            ),
            "set publish date filter",
        )?;

        self.wait_for_element(portal::REFERENCE_INPUT, "reference input")?
            .type_into(reference)
            .map_err(|e| AppError::Extraction(format!("Failed to type reference number: {e}")))?;

        self.wait_for_element(portal::SEARCH_BUTTON, "search submit")?
            .click()
            .map_err(|e| AppError::Extraction(format!("Failed to submit search: {e}")))?;

        self.locate_card(reference)
    }

    /// Poll rendered result cards for one containing the exact reference.
    fn locate_card(&self, reference: &str) -> Result<CardInfo> {
        let deadline = Instant::now() + self.config.card_lookup();
        loop {
            self.cancel.ensure_active()?;

            if let Ok(html) = self.tab.get_content() {
                if let Some(card) = find_card(&Html::parse_document(&html), reference) {
                    info!(reference, "Result card located");
                    return Ok(card);
                }
            }

            if Instant::now() >= deadline {
                return Err(AppError::NotFound {
                    reference: reference.to_string(),
                });
            }
            std::thread::sleep(self.config.poll_interval());
        }
    }

    fn resolve_details_url(&self, card: &CardInfo) -> Result<String> {
        let href = card.details_href.as_deref().ok_or_else(|| {
            AppError::Extraction("Details link missing from the matched result card".to_string())
        })?;
        let base = Url::parse(portal::BASE_URL)
            .map_err(|e| AppError::Internal(format!("Invalid portal base URL: {e}")))?;
        base.join(href)
            .map(|u| u.to_string())
            .map_err(|e| AppError::Extraction(format!("Unresolvable details link {href}: {e}")))
    }

    fn navigate(&self, url: &str) -> Result<()> {
        self.cancel.ensure_active()?;
        debug!(url, "Navigating");
        self.tab
            .navigate_to(url)
            .map_err(|e| AppError::Extraction(format!("Navigation to {url} failed: {e}")))?;
        self.tab.wait_until_navigated().map_err(|e| {
            debug!(url, error = %e, "Page load did not complete within the bound");
            AppError::NavigationTimeout { step: "page load" }
        })?;
        Ok(())
    }

    /// The details page is usable once its header marker renders. A timeout
    /// here means the page structure changed or never loaded.
    fn wait_details_ready(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.details_ready();
        loop {
            self.cancel.ensure_active()?;

            if let Ok(html) = self.tab.get_content() {
                if details_marker_present(&Html::parse_document(&html)) {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(AppError::Extraction(
                    "Details page marker did not appear; page structure may have changed".to_string(),
                ));
            }
            std::thread::sleep(self.config.poll_interval());
        }
    }

    fn wait_for_element(&self, selector: &str, step: &'static str) -> Result<headless_chrome::Element<'_>> {
        let deadline = Instant::now() + self.config.card_lookup();
        loop {
            self.cancel.ensure_active()?;

            if let Ok(element) = self.tab.find_element(selector) {
                return Ok(element);
            }

            if Instant::now() >= deadline {
                return Err(AppError::NavigationTimeout { step });
            }
            std::thread::sleep(self.config.poll_interval());
        }
    }

    fn eval(&self, js: &str, step: &'static str) -> Result<()> {
        self.tab
            .evaluate(js, false)
            .map_err(|e| AppError::Extraction(format!("{step} failed: {e}")))?;
        Ok(())
    }
}

/// Find the result card whose text contains the reference number and read
/// its deadline text and details link.
pub(crate) fn find_card(doc: &Html, reference: &str) -> Option<CardInfo> {
    let cards = Selector::parse(portal::TENDER_CARD).unwrap();
    let links = Selector::parse(portal::DETAILS_LINK).unwrap();

    let card = doc.select(&cards).find(|el| element_text(el).contains(reference))?;
    let text = element_text(&card);

    Some(CardInfo {
        deadline: deadline::from_card(&text),
        details_href: card
            .select(&links)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string),
    })
}

pub(crate) fn details_marker_present(doc: &Html) -> bool {
    let headers = Selector::parse("h2").unwrap();
    doc.select(&headers)
        .any(|el| element_text(&el).contains(portal::DETAILS_HEADER))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_FIXTURE: &str = r#"
        <html><body>
            <div class="tender-card">
                <h5>منافسة أخرى</h5>
                <span>الرقم المرجعي 999999</span>
                <a href="/Tender/DetailsForVisitor?STenderId=zzz">تفاصيل</a>
            </div>
            <div class="tender-card">
                <h5>توريد أجهزة حاسب</h5>
                <span>الرقم المرجعي 241239001234</span>
                <p>آخر موعد لتقديم العروض 2024-09-21 14:30</p>
                <a href="/Tender/DetailsForVisitor?STenderId=abc123">تفاصيل</a>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_find_card_matches_by_reference() {
        let doc = Html::parse_document(LISTING_FIXTURE);
        let card = find_card(&doc, "241239001234").unwrap();
        assert_eq!(card.deadline.as_deref(), Some("2024-09-21 14:30"));
        assert_eq!(
            card.details_href.as_deref(),
            Some("/Tender/DetailsForVisitor?STenderId=abc123")
        );
    }

    #[test]
    fn test_find_card_picks_the_right_card() {
        let doc = Html::parse_document(LISTING_FIXTURE);
        let card = find_card(&doc, "999999").unwrap();
        assert_eq!(card.details_href.as_deref(), Some("/Tender/DetailsForVisitor?STenderId=zzz"));
        // That card carries no deadline text.
        assert_eq!(card.deadline, None);
    }

    #[test]
    fn test_find_card_absent_reference() {
        let doc = Html::parse_document(LISTING_FIXTURE);
        assert!(find_card(&doc, "000000").is_none());
    }

    #[test]
    fn test_find_card_without_details_link() {
        let html = r#"<div class="tender-card"><span>ref 12345</span></div>"#;
        let card = find_card(&Html::parse_document(html), "12345").unwrap();
        assert_eq!(card.details_href, None);
    }

    #[test]
    fn test_details_marker() {
        let ready = Html::parse_document("<html><body><h2>تفاصيل المنافسة</h2></body></html>");
        assert!(details_marker_present(&ready));

        let loading = Html::parse_document("<html><body><h2>جاري التحميل</h2></body></html>");
        assert!(!details_marker_present(&loading));
    }
}
