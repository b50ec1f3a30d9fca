//! Deduplication resolver: stores first, browser last.
//!
//! Resolution order for a search is fixed: the owner's saved competitions,
//! then their cached previews, then a live scrape. The browser pipeline only
//! runs when both stores miss, and each path stamps the record's provenance
//! exactly once.

use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::models::{
    CompetitionRecord, RecordSource, SearchQuery, MSG_EXISTING, MSG_SCRAPED,
};
use crate::scrape::TenderScraper;
use crate::store::{CompetitionStore, PreviewStore};
use crate::utils::error::Result;

pub struct CompetitionResolver {
    competitions: Arc<dyn CompetitionStore>,
    previews: Arc<dyn PreviewStore>,
    scraper: Arc<dyn TenderScraper>,
}

impl CompetitionResolver {
    pub fn new(
        competitions: Arc<dyn CompetitionStore>,
        previews: Arc<dyn PreviewStore>,
        scraper: Arc<dyn TenderScraper>,
    ) -> Self {
        Self {
            competitions,
            previews,
            scraper,
        }
    }

    /// Resolve a raw search string into a tagged record for the given owner.
    #[instrument(skip(self))]
    pub async fn resolve(&self, raw_input: &str, owner: &str) -> Result<CompetitionRecord> {
        let query = SearchQuery::parse(raw_input)?;
        counter!("search_requests_total").increment(1);

        if let Some(mut existing) = self
            .competitions
            .find_by_reference(query.reference(), owner)
            .await?
        {
            info!(reference = query.reference(), "Found in saved competitions");
            counter!("search_hits_total", "store" => "competitions").increment(1);
            existing.source = Some(RecordSource::Existing);
            existing.message = Some(MSG_EXISTING.to_string());
            return Ok(existing);
        }

        if let Some(preview) = self
            .previews
            .find_by_reference(query.reference(), owner)
            .await?
        {
            info!(reference = query.reference(), "Found in cached previews");
            counter!("search_hits_total", "store" => "previews").increment(1);
            return Ok(preview.into_record());
        }

        info!(reference = query.reference(), "Not cached, scraping live from the portal");
        counter!("live_scrapes_total").increment(1);
        let mut record = self.scraper.scrape(&query).await?;
        record.source = Some(RecordSource::NewlyScrapedPreview);
        record.message = Some(MSG_SCRAPED.to_string());

        // Cache for the next search; losing the cache write is not worth
        // failing a successful scrape over.
        if let Err(e) = self.previews.store_preview(&record, owner).await {
            warn!(error = %e, "Failed to cache scraped preview");
        }

        Ok(record)
    }
}
