//! Submission-deadline resolution from its two sources.
//!
//! The search-result card is the primary source: it is scraped before the
//! details page and carries the deadline in a stable `YYYY-MM-DD HH:MM`
//! layout right after a fixed label phrase. The details page shows the same
//! deadline in `DD/MM/YYYY HH:MM` and is consulted only when the card text
//! yielded nothing. When neither parses the deadline stays unset; an absent
//! deadline is acceptable and never fails the scrape.

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::warn;

use crate::portal;

/// Canonical deadline format produced by this module.
pub const DEADLINE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Extract the deadline from a result card's text. Validates through chrono
/// so only real timestamps reach the canonical record.
pub fn from_card(card_text: &str) -> Option<String> {
    let pattern = format!(
        r"{}\s*(\d{{4}}-\d{{2}}-\d{{2}})\s*(\d{{2}}:\d{{2}})",
        portal::CARD_DEADLINE_LABEL
    );
    let re = Regex::new(&pattern).unwrap();
    let caps = re.captures(card_text)?;
    let combined = format!("{} {}", &caps[1], &caps[2]);
    match NaiveDateTime::parse_from_str(&combined, DEADLINE_FORMAT) {
        Ok(_) => Some(combined),
        Err(e) => {
            warn!(candidate = %combined, error = %e, "Card deadline matched but is not a valid timestamp");
            None
        }
    }
}

/// Reformat the details-page deadline (`DD/MM/YYYY HH:MM`) into the
/// canonical layout.
pub fn from_details(raw: &str) -> Option<String> {
    let re = Regex::new(r"\d{2}/\d{2}/\d{4} \d{2}:\d{2}").unwrap();
    let matched = re.find(raw)?;
    NaiveDateTime::parse_from_str(matched.as_str(), "%d/%m/%Y %H:%M")
        .ok()
        .map(|dt| dt.format(DEADLINE_FORMAT).to_string())
}

/// Apply the precedence: card first, details-page value only as a fallback.
pub fn resolve(card_deadline: Option<String>, details_raw: Option<&str>) -> Option<String> {
    if card_deadline.is_some() {
        return card_deadline;
    }
    let resolved = details_raw.and_then(from_details);
    if resolved.is_none() {
        // Missing deadline is tolerated; the record ships without one.
        warn!("No submission deadline could be resolved from either source");
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_from_card_extracts_canonical_deadline() {
        let text = "منافسة توريد أجهزة آخر موعد لتقديم العروض 2024-09-21 14:30 تفاصيل";
        assert_eq!(from_card(text), Some("2024-09-21 14:30".to_string()));
    }

    #[test]
    fn test_from_card_rejects_impossible_date() {
        let text = "آخر موعد لتقديم العروض 2024-13-45 14:30";
        assert_eq!(from_card(text), None);
    }

    #[test]
    fn test_from_card_without_label() {
        assert_eq!(from_card("2024-09-21 14:30"), None);
    }

    #[rstest]
    #[case("21/09/2024 14:30", Some("2024-09-21 14:30"))]
    #[case("آخر موعد لتقديم العروض 01/02/2025 09:05", Some("2025-02-01 09:05"))]
    #[case("31/02/2024 10:00", None)] // February 31st does not exist
    #[case("2024-09-21 14:30", None)] // already canonical, not the details layout
    #[case("", None)]
    fn test_from_details(#[case] raw: &str, #[case] expected: Option<&str>) {
        assert_eq!(from_details(raw).as_deref(), expected);
    }

    #[test]
    fn test_resolve_prefers_card() {
        // The fallback must not be consulted when the primary is present.
        let resolved = resolve(
            Some("2024-09-21 14:30".to_string()),
            Some("01/01/1999 00:00"),
        );
        assert_eq!(resolved.as_deref(), Some("2024-09-21 14:30"));
    }

    #[test]
    fn test_resolve_falls_back_to_details() {
        let resolved = resolve(None, Some("21/09/2024 14:30"));
        assert_eq!(resolved.as_deref(), Some("2024-09-21 14:30"));
    }

    #[test]
    fn test_resolve_both_absent() {
        assert_eq!(resolve(None, None), None);
        assert_eq!(resolve(None, Some("not a date")), None);
    }
}
