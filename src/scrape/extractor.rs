//! Label-driven field extraction from a details-page DOM snapshot.
//!
//! Works on parsed HTML (`scraper::Html`) rather than live DOM calls so the
//! heuristics can be exercised against markup fixtures. A field that cannot
//! be located is simply left unset; only page readiness (handled by the
//! navigator) is a hard failure.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use tracing::debug;

use crate::portal::{self, FieldKey, Strategy};

/// Raw field values read off the details page. `deadline_details` is
/// transient input for the deadline resolver and is dropped at assembly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFields {
    pub name: Option<String>,
    pub reference_number: Option<String>,
    pub brochure_cost: f64,
    pub competition_type: Option<String>,
    pub contract_duration: Option<String>,
    pub government_entity: Option<String>,
    pub etimad_status: Option<String>,
    pub submission_method: Option<String>,
    pub competition_purpose: Option<String>,
    pub guarantee_required: Option<String>,
    pub deadline_details: Option<String>,
}

/// Run the label table over the document. Misses yield unset fields, never
/// errors.
pub fn extract(doc: &Html) -> ExtractedFields {
    let mut fields = ExtractedFields::default();

    for entry in portal::FIELD_LABELS {
        let value = find_labeled_value(doc, entry.label, entry.strategy);
        if value.is_none() {
            debug!(label = entry.label, "Details field not found");
        }
        match entry.key {
            FieldKey::Name => fields.name = value,
            FieldKey::ReferenceNumber => fields.reference_number = value,
            FieldKey::BrochureCost => {
                fields.brochure_cost = value.as_deref().map(parse_cost).unwrap_or(0.0)
            }
            FieldKey::CompetitionType => fields.competition_type = value,
            FieldKey::ContractDuration => fields.contract_duration = value,
            FieldKey::GovernmentEntity => fields.government_entity = value,
            FieldKey::EtimadStatus => fields.etimad_status = value,
            FieldKey::SubmissionMethod => fields.submission_method = value,
            FieldKey::DeadlineDetails => fields.deadline_details = value,
            FieldKey::CompetitionPurpose => fields.competition_purpose = value,
            FieldKey::GuaranteeRequired => fields.guarantee_required = value,
        }
    }

    // Last resort for the name: the page's primary heading.
    if fields.name.is_none() {
        fields.name = primary_heading(doc);
    }

    fields
}

/// Locate an element containing `label` among the label-host elements, then
/// read its value with the preferred strategy, falling back to the other.
fn find_labeled_value(doc: &Html, label: &str, strategy: Strategy) -> Option<String> {
    let hosts = Selector::parse(portal::LABEL_HOSTS).unwrap();
    let target = doc
        .select(&hosts)
        .find(|el| element_text(el).contains(label))?;

    match strategy {
        Strategy::SiblingText => {
            sibling_text(&target).or_else(|| parent_text_minus_label(&target, label))
        }
        Strategy::ParentMinusLabel => {
            parent_text_minus_label(&target, label).or_else(|| sibling_text(&target))
        }
    }
}

fn sibling_text(label_el: &ElementRef) -> Option<String> {
    label_el
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
}

fn parent_text_minus_label(label_el: &ElementRef, label: &str) -> Option<String> {
    let parent = label_el.parent().and_then(ElementRef::wrap)?;
    let text = element_text(&parent);
    if !text.contains(label) {
        return None;
    }
    let value = text.replace(label, "").trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn primary_heading(doc: &Html) -> Option<String> {
    let h2 = Selector::parse("h2").unwrap();
    doc.select(&h2)
        .map(|el| element_text(&el))
        .find(|text| !text.is_empty())
}

pub(crate) fn element_text(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a displayed cost ("1,500.00 ريال") into a number, defaulting to
/// 0 when nothing parseable remains.
pub fn parse_cost(raw: &str) -> f64 {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    Decimal::from_str(&cleaned)
        .ok()
        .and_then(|d| d.to_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DETAILS_FIXTURE: &str = r#"
        <html dir="rtl"><body>
            <h2>تفاصيل المنافسة</h2>
            <div class="row">
                <div class="col">
                    <span class="etd-item-title">اسم المنافسة</span>
                    <span>توريد وتركيب أجهزة حاسب آلي</span>
                </div>
                <div class="col">
                    <span class="etd-item-title">الرقم المرجعي</span>
                    <span>241239001234</span>
                </div>
                <div class="col">
                    <span class="etd-item-title">قيمة وثائق المنافسة</span>
                    <span>1,500.00 ريال</span>
                </div>
                <div class="col">
                    <span class="etd-item-title">نوع المنافسة</span>
                    <span>منافسة عامة</span>
                </div>
                <div class="col">
                    <span class="etd-item-title">آخر موعد لتقديم العروض</span>
                    <span>21/09/2024 14:30</span>
                </div>
                <div class="col">
                    <p>الغرض من المنافسة تأمين احتياجات الجهة</p>
                </div>
            </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_sibling_values() {
        let doc = Html::parse_document(DETAILS_FIXTURE);
        let fields = extract(&doc);

        assert_eq!(fields.name.as_deref(), Some("توريد وتركيب أجهزة حاسب آلي"));
        assert_eq!(fields.reference_number.as_deref(), Some("241239001234"));
        assert_eq!(fields.competition_type.as_deref(), Some("منافسة عامة"));
        assert_eq!(fields.deadline_details.as_deref(), Some("21/09/2024 14:30"));
    }

    #[test]
    fn test_extract_normalizes_brochure_cost() {
        let doc = Html::parse_document(DETAILS_FIXTURE);
        let fields = extract(&doc);
        assert_eq!(fields.brochure_cost, 1500.0);
    }

    #[test]
    fn test_extract_parent_fallback() {
        // Label nested in the same element as its value: only the parent
        // strategy can pick it up.
        let doc = Html::parse_document(DETAILS_FIXTURE);
        let fields = extract(&doc);
        assert_eq!(
            fields.competition_purpose.as_deref(),
            Some("تأمين احتياجات الجهة")
        );
    }

    #[test]
    fn test_extract_missing_fields_stay_unset() {
        let doc = Html::parse_document(DETAILS_FIXTURE);
        let fields = extract(&doc);
        assert!(fields.government_entity.is_none());
        assert!(fields.guarantee_required.is_none());
    }

    #[test]
    fn test_name_falls_back_to_heading() {
        let html = r#"
            <html><body>
                <h2>منافسة صيانة الطرق</h2>
                <span class="etd-item-title">الرقم المرجعي</span>
                <span>240011</span>
            </body></html>
        "#;
        let doc = Html::parse_document(html);
        let fields = extract(&doc);
        assert_eq!(fields.name.as_deref(), Some("منافسة صيانة الطرق"));
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let doc = Html::parse_document("<html><body></body></html>");
        let fields = extract(&doc);
        assert_eq!(fields, ExtractedFields::default());
        assert_eq!(fields.brochure_cost, 0.0);
    }

    #[test]
    fn test_sibling_skips_empty_elements() {
        let html = r#"
            <div>
                <span class="label">حالة المنافسة</span>
                <span></span>
                <span>قائمة</span>
            </div>
        "#;
        let doc = Html::parse_document(html);
        let fields = extract(&doc);
        assert_eq!(fields.etimad_status.as_deref(), Some("قائمة"));
    }

    #[rstest]
    #[case("1,500.00 ريال", 1500.0)]
    #[case("500", 500.0)]
    #[case("0.5", 0.5)]
    #[case("مجاناً", 0.0)]
    #[case("", 0.0)]
    #[case("1.2.3", 0.0)] // two decimal points cannot parse
    fn test_parse_cost(#[case] raw: &str, #[case] expected: f64) {
        assert_eq!(parse_cost(raw), expected);
    }
}
