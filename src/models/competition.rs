use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;

use crate::portal;
use crate::utils::error::{AppError, Result};

/// Which resolution path produced a record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Existing,
    ScrapedPreview,
    NewlyScrapedPreview,
}

// Status messages shown to the caller alongside the source tag.
pub const MSG_EXISTING: &str = "المنافسة موجودة بالفعل في قاعدة البيانات";
pub const MSG_PREVIEW: &str = "البيانات متاحة للعرض - اضغط حفظ لإضافتها لقاعدة البيانات";
pub const MSG_SCRAPED: &str = "تم سحب البيانات بنجاح - اضغط حفظ لإضافتها لقاعدة البيانات";

/// Canonical competition record, serialized camelCase on the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub reference_number: String,
    #[serde(default)]
    pub brochure_cost: f64,
    #[serde(default)]
    pub competition_type: Option<String>,
    #[serde(default)]
    pub contract_duration: Option<String>,
    #[serde(default)]
    pub government_entity: Option<String>,
    #[serde(default)]
    pub etimad_status: Option<String>,
    #[serde(default)]
    pub submission_method: Option<String>,
    #[serde(default)]
    pub competition_purpose: Option<String>,
    #[serde(default)]
    pub guarantee_required: Option<String>,
    /// Normalized `YYYY-MM-DD HH:MM`, or None when neither source parsed.
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub competition_url: Option<String>,
    #[serde(default)]
    pub awarded_supplier: Option<String>,
    #[serde(default)]
    pub award_amount: Option<f64>,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RecordSource>,
    #[sqlx(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
}

impl CompetitionRecord {
    /// Empty-string fields arriving from the UI are stored as NULL.
    pub fn normalize_empty(&mut self) {
        for field in [
            &mut self.name,
            &mut self.competition_type,
            &mut self.contract_duration,
            &mut self.government_entity,
            &mut self.etimad_status,
            &mut self.submission_method,
            &mut self.competition_purpose,
            &mut self.guarantee_required,
            &mut self.deadline,
            &mut self.competition_url,
            &mut self.awarded_supplier,
        ] {
            if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
                *field = None;
            }
        }
    }
}

/// Row shape of the preview (`scraped_competitions`) table. Column names are
/// snake_case and diverge from the canonical record; `into_record` performs
/// the remap.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct ScrapedCompetitionRow {
    pub id: String,
    pub name: Option<String>,
    pub reference_number: String,
    pub brochure_cost: f64,
    pub competition_type: Option<String>,
    pub contract_duration: Option<String>,
    pub government_entity: Option<String>,
    pub etimad_status: Option<String>,
    pub submission_method: Option<String>,
    pub competition_purpose: Option<String>,
    pub guarantee_required: Option<String>,
    pub deadline: Option<String>,
    pub competition_url: Option<String>,
    pub awarded_supplier: Option<String>,
    pub award_amount: Option<f64>,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedCompetitionRow {
    /// Remap preview column names onto the canonical record, tagged
    /// `scraped_preview`.
    pub fn into_record(self) -> CompetitionRecord {
        CompetitionRecord {
            id: Some(self.id),
            name: self.name,
            reference_number: self.reference_number,
            brochure_cost: self.brochure_cost,
            competition_type: self.competition_type,
            contract_duration: self.contract_duration,
            government_entity: self.government_entity,
            etimad_status: self.etimad_status,
            submission_method: self.submission_method,
            competition_purpose: self.competition_purpose,
            guarantee_required: self.guarantee_required,
            deadline: self.deadline,
            competition_url: self.competition_url,
            awarded_supplier: self.awarded_supplier,
            award_amount: self.award_amount,
            source: Some(RecordSource::ScrapedPreview),
            message: Some(MSG_PREVIEW.to_string()),
            date_added: Some(self.scraped_at),
        }
    }
}

/// Classified search input: a direct portal URL or a bare reference number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    reference: String,
    url: Option<String>,
}

impl SearchQuery {
    /// Classify a raw search string. Portal URLs must carry the tender id
    /// query parameter; anything else is taken as a reference number.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(AppError::Input(
                "Please provide a reference number or a competition URL.".to_string(),
            ));
        }

        if input.starts_with(portal::BASE_URL) {
            let url = Url::parse(input)
                .map_err(|e| AppError::Input(format!("Invalid competition URL: {e}")))?;
            let reference = url
                .query_pairs()
                .find(|(key, _)| key == portal::TENDER_ID_PARAM)
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    AppError::Input("Could not extract reference number from input.".to_string())
                })?;
            Ok(Self { reference, url: Some(input.to_string()) })
        } else {
            Ok(Self { reference: input.to_string(), url: None })
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Direct details URL, present only for URL inputs.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_source_tags() {
        assert_eq!(serde_json::to_string(&RecordSource::Existing).unwrap(), "\"existing\"");
        assert_eq!(
            serde_json::to_string(&RecordSource::ScrapedPreview).unwrap(),
            "\"scraped_preview\""
        );
        assert_eq!(
            serde_json::to_string(&RecordSource::NewlyScrapedPreview).unwrap(),
            "\"newly_scraped_preview\""
        );
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = CompetitionRecord {
            id: None,
            name: Some("توريد أجهزة".to_string()),
            reference_number: "241239001234".to_string(),
            brochure_cost: 1500.0,
            competition_type: None,
            contract_duration: None,
            government_entity: None,
            etimad_status: None,
            submission_method: None,
            competition_purpose: None,
            guarantee_required: None,
            deadline: Some("2024-09-21 14:30".to_string()),
            competition_url: None,
            awarded_supplier: None,
            award_amount: None,
            source: Some(RecordSource::NewlyScrapedPreview),
            message: None,
            date_added: None,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["referenceNumber"], "241239001234");
        assert_eq!(json["brochureCost"], 1500.0);
        assert_eq!(json["deadline"], "2024-09-21 14:30");
        assert_eq!(json["source"], "newly_scraped_preview");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_record_deserializes_with_missing_optionals() {
        let record: CompetitionRecord =
            serde_json::from_str(r#"{"referenceNumber": "241239001234"}"#).unwrap();
        assert_eq!(record.reference_number, "241239001234");
        assert_eq!(record.brochure_cost, 0.0);
        assert!(record.deadline.is_none());
        assert!(record.source.is_none());
    }

    #[test]
    fn test_normalize_empty() {
        let mut record: CompetitionRecord = serde_json::from_str(
            r#"{"referenceNumber": "1", "name": "  ", "deadline": "", "etimadStatus": "قائمة"}"#,
        )
        .unwrap();
        record.normalize_empty();
        assert!(record.name.is_none());
        assert!(record.deadline.is_none());
        assert_eq!(record.etimad_status.as_deref(), Some("قائمة"));
    }

    #[test]
    fn test_preview_row_remap() {
        let row = ScrapedCompetitionRow {
            id: "abc".to_string(),
            name: Some("منافسة".to_string()),
            reference_number: "241239001234".to_string(),
            brochure_cost: 500.0,
            competition_type: Some("عامة".to_string()),
            contract_duration: None,
            government_entity: None,
            etimad_status: None,
            submission_method: None,
            competition_purpose: None,
            guarantee_required: None,
            deadline: Some("2024-09-21 14:30".to_string()),
            competition_url: None,
            awarded_supplier: None,
            award_amount: None,
            scraped_at: Utc::now(),
        };

        let record = row.clone().into_record();
        assert_eq!(record.id.as_deref(), Some("abc"));
        assert_eq!(record.reference_number, row.reference_number);
        assert_eq!(record.source, Some(RecordSource::ScrapedPreview));
        assert_eq!(record.message.as_deref(), Some(MSG_PREVIEW));

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["referenceNumber"], "241239001234");
        assert_eq!(json["source"], "scraped_preview");
    }

    #[test]
    fn test_search_query_bare_reference() {
        let query = SearchQuery::parse(" 241239001234 ").unwrap();
        assert_eq!(query.reference(), "241239001234");
        assert!(query.url().is_none());
    }

    #[test]
    fn test_search_query_portal_url() {
        let input =
            "https://tenders.etimad.sa/Tender/DetailsForVisitor?TenderID=AbC123xyz&foo=bar";
        let query = SearchQuery::parse(input).unwrap();
        assert_eq!(query.reference(), "AbC123xyz");
        assert_eq!(query.url(), Some(input));
    }

    #[test]
    fn test_search_query_url_without_tender_id() {
        let err = SearchQuery::parse("https://tenders.etimad.sa/Tender/AllTendersForVisitor")
            .unwrap_err();
        assert!(matches!(err, AppError::Input(_)));
    }

    #[test]
    fn test_search_query_empty_input() {
        assert!(matches!(SearchQuery::parse("   "), Err(AppError::Input(_))));
    }

    #[test]
    fn test_non_portal_url_is_treated_as_reference() {
        // Only the portal prefix triggers URL handling; everything else is a
        // reference number and will simply miss on the portal search.
        let query = SearchQuery::parse("https://example.com/?TenderID=1").unwrap();
        assert!(query.url().is_none());
    }
}
