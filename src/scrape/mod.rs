//! Live-scrape pipeline: navigation, extraction, and assembly of one
//! [`CompetitionRecord`] from the portal.
//!
//! `headless_chrome` drives a real browser over a synchronous API, so the
//! whole pipeline runs on a blocking thread; the async caller keeps a
//! cancellation guard that stops in-flight waits if the request goes away.

use async_trait::async_trait;
use metrics::counter;
use scraper::Html;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::browser::{BrowserManager, CancelToken, TabGuard};
use crate::config::ScraperConfig;
use crate::models::{CompetitionRecord, SearchQuery};
use crate::utils::error::{AppError, Result};

pub mod award;
pub mod deadline;
pub mod extractor;
pub mod navigator;

use award::AwardOutcome;
use extractor::ExtractedFields;
use navigator::{Navigator, Phase};

/// Seam between the dedup resolver and the live pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TenderScraper: Send + Sync {
    /// Scrape one tender from the portal. The returned record carries no
    /// `source` tag; the resolver owns provenance.
    async fn scrape(&self, query: &SearchQuery) -> Result<CompetitionRecord>;
}

/// Production scraper backed by the shared browser.
pub struct EtimadScraper {
    browser: Arc<BrowserManager>,
    config: ScraperConfig,
}

impl EtimadScraper {
    pub fn new(browser: Arc<BrowserManager>, config: ScraperConfig) -> Self {
        Self { browser, config }
    }
}

#[async_trait]
impl TenderScraper for EtimadScraper {
    #[instrument(skip(self, query), fields(reference = query.reference()))]
    async fn scrape(&self, query: &SearchQuery) -> Result<CompetitionRecord> {
        let browser = self.browser.acquire().await?;
        let config = self.config.clone();
        let query = query.clone();

        let cancel = CancelToken::new();
        // Dropping this future (client gone, server shutdown) cancels the
        // blocking pipeline at its next poll.
        let _guard = cancel.clone().drop_guard();
        let worker_cancel = cancel.clone();

        let result = tokio::task::spawn_blocking(move || {
            run_pipeline(&browser, &query, &config, &worker_cancel)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Scrape task panicked: {e}")))?;

        match &result {
            Ok(record) => {
                counter!("scrapes_completed_total").increment(1);
                info!(reference = %record.reference_number, "Scrape completed");
            }
            Err(e) => {
                if e.is_scrape_failure() {
                    counter!("scrape_failures_total").increment(1);
                }
                tracing::warn!(error = %e, "Scrape failed");
            }
        }
        result
    }
}

/// Synchronous pipeline body. The tab guard closes the page on every exit
/// path, success or error.
fn run_pipeline(
    browser: &headless_chrome::Browser,
    query: &SearchQuery,
    config: &ScraperConfig,
    cancel: &CancelToken,
) -> Result<CompetitionRecord> {
    let tab = TabGuard::open(browser, config)?;
    let mut nav = Navigator::new(&tab, config, cancel);

    let outcome = nav.run(query)?;

    let html = tab
        .get_content()
        .map_err(|e| AppError::Extraction(format!("Failed to read details page: {e}")))?;
    let fields = extractor::extract(&Html::parse_document(&html));

    nav.transition(Phase::AwardTabCheck);
    let award = award::extract(&tab, config, cancel);

    let deadline = deadline::resolve(outcome.card_deadline, fields.deadline_details.as_deref());

    // Prefer the browser's idea of the final URL; redirects may have moved us.
    let final_url = match tab.get_url() {
        url if url.is_empty() => outcome.final_url,
        url => url,
    };

    let record = assemble(fields, deadline, award, final_url);
    if record.reference_number.is_empty() {
        let err = AppError::Extraction(
            "Could not scrape the reference number. The competition might not exist.".to_string(),
        );
        nav.fail(&err);
        return Err(err);
    }

    nav.transition(Phase::Done);
    Ok(record)
}

/// Merge the extraction stages into one canonical record. The transient
/// details-page deadline has already been consumed by the resolver and does
/// not survive into the record.
fn assemble(
    fields: ExtractedFields,
    deadline: Option<String>,
    award: AwardOutcome,
    final_url: String,
) -> CompetitionRecord {
    CompetitionRecord {
        id: None,
        name: fields.name,
        reference_number: fields.reference_number.unwrap_or_default(),
        brochure_cost: fields.brochure_cost,
        competition_type: fields.competition_type,
        contract_duration: fields.contract_duration,
        government_entity: fields.government_entity,
        etimad_status: fields.etimad_status,
        submission_method: fields.submission_method,
        competition_purpose: fields.competition_purpose,
        guarantee_required: fields.guarantee_required,
        deadline,
        competition_url: Some(final_url),
        awarded_supplier: award.supplier,
        award_amount: award.amount,
        source: None,
        message: None,
        date_added: None,
    }
}
