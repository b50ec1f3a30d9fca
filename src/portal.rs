//! Constants describing the Etimad tender portal's UI.
//!
//! Everything the scraper knows about the portal's markup lives here: page
//! URLs, the selectors driven during search, and the label table mapping
//! portal-displayed Arabic labels to canonical record fields. Upstream layout
//! changes are the main operational risk, so the knowledge is kept
//! declarative and in one place.

/// URL prefix identifying a direct tender link.
pub const BASE_URL: &str = "https://tenders.etimad.sa";

/// Public tender listing, entry point for the search flow.
pub const LISTING_URL: &str = "https://tenders.etimad.sa/Tender/AllTendersForVisitor";

/// Query parameter carrying the tender identifier in direct links.
pub const TENDER_ID_PARAM: &str = "TenderID";

// Search-flow selectors
pub const SEARCH_PANEL_TOGGLE: &str = "#searchBtnColaps";
pub const DATES_TAB_LINK: &str = r##"a[href="#dates"]"##;
pub const PUBLISH_DATE_SELECT: &str = "#PublishDateId";
pub const REFERENCE_INPUT: &str = "#txtReferenceNumber";
pub const SEARCH_BUTTON: &str = "#searchBtn";

/// `<option>` value meaning "any publish date". Without it the portal hides
/// tenders outside a recent window.
pub const PUBLISH_DATE_ANY: &str = "1";

/// One result card in the search listing.
pub const TENDER_CARD: &str = "div.tender-card";
/// Link from a card to the tender's details page.
pub const DETAILS_LINK: &str = r#"a[href*="DetailsForVisitor"]"#;

/// Details page marker; the page is not usable until this renders.
pub const DETAILS_HEADER: &str = "تفاصيل المنافسة";
/// Elements that may host a field label on the details page.
pub const LABEL_HOSTS: &str = ".etd-item-title, .label, h3, span, p";

// Award results
pub const AWARD_TAB: &str = "#awardingStepTab";
pub const AWARD_TABLE_HEADER: &str = "قائمة الموردين المرسى عليهم";
pub const AWARD_NOT_ANNOUNCED: &str = "لم يتم اعلان نتائج الترسية بعد";
pub const AWARD_UNAVAILABLE: &str = "غير متاح";
pub const AWARD_EXTRACT_FAILED: &str = "خطأ في جلب البيانات";

/// Label phrase preceding the deadline on a result card.
pub const CARD_DEADLINE_LABEL: &str = "آخر موعد لتقديم العروض";

/// Canonical record fields the details page is read into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    Name,
    ReferenceNumber,
    BrochureCost,
    CompetitionType,
    ContractDuration,
    GovernmentEntity,
    EtimadStatus,
    SubmissionMethod,
    /// Deadline as displayed on the details page (`DD/MM/YYYY HH:MM`).
    /// Transient: consumed by the deadline resolver, never stored.
    DeadlineDetails,
    CompetitionPurpose,
    GuaranteeRequired,
}

/// How a value is read once its label element is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Read the text of the label's next element sibling.
    SiblingText,
    /// Read the label's parent text with the label substring removed.
    ParentMinusLabel,
}

pub struct FieldLabel {
    pub label: &'static str,
    pub key: FieldKey,
    /// Preferred strategy; the extractor falls back to the other one when
    /// the preferred read yields nothing.
    pub strategy: Strategy,
}

/// Label table for the details page. The portal renders label/value as
/// adjacent siblings, so sibling-text is preferred throughout; the parent
/// fallback catches the occasional label nested inside its value container.
pub const FIELD_LABELS: &[FieldLabel] = &[
    FieldLabel { label: "اسم المنافسة", key: FieldKey::Name, strategy: Strategy::SiblingText },
    FieldLabel { label: "الرقم المرجعي", key: FieldKey::ReferenceNumber, strategy: Strategy::SiblingText },
    FieldLabel { label: "قيمة وثائق المنافسة", key: FieldKey::BrochureCost, strategy: Strategy::SiblingText },
    FieldLabel { label: "نوع المنافسة", key: FieldKey::CompetitionType, strategy: Strategy::SiblingText },
    FieldLabel { label: "مدة العقد", key: FieldKey::ContractDuration, strategy: Strategy::SiblingText },
    FieldLabel { label: "الجهة الحكوميه", key: FieldKey::GovernmentEntity, strategy: Strategy::SiblingText },
    FieldLabel { label: "حالة المنافسة", key: FieldKey::EtimadStatus, strategy: Strategy::SiblingText },
    FieldLabel { label: "طريقة تقديم العروض", key: FieldKey::SubmissionMethod, strategy: Strategy::SiblingText },
    FieldLabel { label: "آخر موعد لتقديم العروض", key: FieldKey::DeadlineDetails, strategy: Strategy::SiblingText },
    FieldLabel { label: "الغرض من المنافسة", key: FieldKey::CompetitionPurpose, strategy: Strategy::ParentMinusLabel },
    FieldLabel { label: "مطلوب ضمان الإبتدائي", key: FieldKey::GuaranteeRequired, strategy: Strategy::ParentMinusLabel },
];
