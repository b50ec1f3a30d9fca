//! Best-effort extraction of award results from the details page.
//!
//! Isolated from the rest of the pipeline: whatever goes wrong here is
//! absorbed into a placeholder value, never a failure of the parent scrape.
//! A record with every field except award info beats no record at all.

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, warn};

use crate::browser::{CancelToken, TabGuard};
use crate::config::ScraperConfig;
use crate::portal;
use crate::scrape::extractor::element_text;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AwardOutcome {
    pub supplier: Option<String>,
    pub amount: Option<f64>,
}

impl AwardOutcome {
    fn unavailable() -> Self {
        Self {
            supplier: Some(portal::AWARD_UNAVAILABLE.to_string()),
            amount: None,
        }
    }

    fn extraction_failed() -> Self {
        Self {
            supplier: Some(portal::AWARD_EXTRACT_FAILED.to_string()),
            amount: None,
        }
    }
}

/// Read award results off the current details page. Infallible by design:
/// every failure path degrades to a placeholder outcome.
pub fn extract(tab: &TabGuard, config: &ScraperConfig, cancel: &CancelToken) -> AwardOutcome {
    match try_extract(tab, config, cancel) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "Award extraction failed, downgrading to placeholder");
            AwardOutcome::extraction_failed()
        }
    }
}

fn try_extract(tab: &TabGuard, config: &ScraperConfig, cancel: &CancelToken) -> Result<AwardOutcome> {
    cancel.ensure_active()?;

    let html = tab
        .get_content()
        .map_err(|e| AppError::Extraction(format!("Failed to read details page: {e}")))?;
    if !has_award_tab(&Html::parse_document(&html)) {
        debug!("Awarding tab not present, results unavailable for this tender");
        return Ok(AwardOutcome::unavailable());
    }

    tab.find_element(portal::AWARD_TAB)
        .and_then(|el| el.click().map(|_| ()))
        .map_err(|e| AppError::Extraction(format!("Failed to activate awarding tab: {e}")))?;

    // The tab content renders asynchronously; poll for a recognizable state
    // instead of sleeping a fixed interval.
    let deadline = Instant::now() + config.award_settle();
    loop {
        cancel.ensure_active()?;

        let html = tab
            .get_content()
            .map_err(|e| AppError::Extraction(format!("Failed to read awarding tab: {e}")))?;
        if let Some(outcome) = parse_award(&Html::parse_document(&html)) {
            return Ok(outcome);
        }

        if Instant::now() >= deadline {
            warn!("Awarding tab content did not settle within the bound");
            return Ok(AwardOutcome::extraction_failed());
        }
        std::thread::sleep(config.poll_interval());
    }
}

fn has_award_tab(doc: &Html) -> bool {
    let tab = Selector::parse(portal::AWARD_TAB).unwrap();
    doc.select(&tab).next().is_some()
}

/// Interpret the awarding tab's DOM. `None` means the content has not
/// settled into a recognizable state yet.
pub(crate) fn parse_award(doc: &Html) -> Option<AwardOutcome> {
    let headers = Selector::parse("h4").unwrap();
    if let Some(header) = doc
        .select(&headers)
        .find(|el| element_text(el).contains(portal::AWARD_TABLE_HEADER))
    {
        return Some(read_award_table(&header));
    }

    let body = Selector::parse("body").unwrap();
    let page_text = doc.select(&body).next().map(|el| element_text(&el)).unwrap_or_default();
    if page_text.contains(portal::AWARD_NOT_ANNOUNCED) {
        return Some(AwardOutcome {
            supplier: Some(portal::AWARD_NOT_ANNOUNCED.to_string()),
            amount: None,
        });
    }

    None
}

/// Walk forward from the results header to the first table and read its
/// first body row: first cell is the supplier, third is the amount.
fn read_award_table(header: &ElementRef) -> AwardOutcome {
    let table = header
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "table");

    let Some(table) = table else {
        return AwardOutcome::default();
    };

    let row = Selector::parse("tbody tr").unwrap();
    let cell = Selector::parse("td").unwrap();
    let Some(first_row) = table.select(&row).next() else {
        return AwardOutcome::default();
    };

    let cells: Vec<String> = first_row.select(&cell).map(|el| element_text(&el)).collect();
    if cells.len() < 3 {
        return AwardOutcome::default();
    }

    AwardOutcome {
        supplier: Some(cells[0].clone()).filter(|s| !s.is_empty()),
        amount: parse_amount(&cells[2]),
    }
}

/// Leading numeric token with thousands separators stripped.
pub(crate) fn parse_amount(raw: &str) -> Option<f64> {
    let re = Regex::new(r"[\d.,]+").unwrap();
    let token = re.find(raw)?.as_str().replace(',', "");
    Decimal::from_str(&token).ok().and_then(|d| d.to_f64())
}
