//! Edition types for the catalog graph.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::issue::IssueId;

/// Stable identifier of a collected edition.
///
/// Wraps the catalog's identifier string (slug or UUID text) and implements
/// `Ord` so every traversal can fall back to a deterministic tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditionId(String);

impl EditionId {
    /// Create a new EditionId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EditionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EditionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Print availability of an edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrintStatus {
    /// Currently purchasable new.
    InPrint,
    /// No longer printed; secondary market only.
    OutOfPrint,
    /// Announced but not yet released.
    Upcoming,
    /// Only available digitally.
    DigitalOnly,
    /// Series still publishing new volumes.
    Ongoing,
    /// Availability not known.
    Unknown,
}

impl PrintStatus {
    /// Parse print status from string.
    ///
    /// Accepts snake_case and kebab-case spellings. The store's
    /// `check_availability` marker maps to `Unknown`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "in_print" => Some(Self::InPrint),
            "out_of_print" => Some(Self::OutOfPrint),
            "upcoming" => Some(Self::Upcoming),
            "digital_only" => Some(Self::DigitalOnly),
            "ongoing" => Some(Self::Ongoing),
            "unknown" | "check_availability" | "" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Whether a physical copy can be bought (or pre-ordered) at cover price.
    pub fn is_physical(&self) -> bool {
        !matches!(self, Self::DigitalOnly)
    }
}

impl Default for PrintStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for PrintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InPrint => write!(f, "in_print"),
            Self::OutOfPrint => write!(f, "out_of_print"),
            Self::Upcoming => write!(f, "upcoming"),
            Self::DigitalOnly => write!(f, "digital_only"),
            Self::Ongoing => write!(f, "ongoing"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Importance tier of an edition.
///
/// Declared from most to least important, so the derived `Ord` sorts
/// essential editions first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    /// Core reading.
    Essential,
    /// Strongly suggested.
    Recommended,
    /// Adds context.
    Supplemental,
    /// For completionists only.
    Completionist,
}

impl Importance {
    /// Parse importance from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "essential" => Some(Self::Essential),
            "recommended" => Some(Self::Recommended),
            "supplemental" => Some(Self::Supplemental),
            "completionist" => Some(Self::Completionist),
            _ => None,
        }
    }
}

impl Default for Importance {
    fn default() -> Self {
        Self::Recommended
    }
}

impl fmt::Display for Importance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Essential => write!(f, "essential"),
            Self::Recommended => write!(f, "recommended"),
            Self::Supplemental => write!(f, "supplemental"),
            Self::Completionist => write!(f, "completionist"),
        }
    }
}

/// Physical format of a collected edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditionFormat {
    /// Large hardcover collecting a long run.
    Omnibus,
    /// Chronological softcover line.
    EpicCollection,
    /// Standard trade paperback.
    TradePaperback,
    /// Standard hardcover.
    Hardcover,
    /// Restored classic reprints.
    Masterworks,
    /// Thick softcover covering a full era.
    Compendium,
    /// Complete-collection softcover.
    CompleteCollection,
    /// Oversized hardcover.
    OversizedHardcover,
}

impl EditionFormat {
    /// Parse format from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(|c: char| c == '-' || c == ' ', "_").as_str() {
            "omnibus" => Some(Self::Omnibus),
            "epic_collection" => Some(Self::EpicCollection),
            "trade_paperback" | "tpb" => Some(Self::TradePaperback),
            "hardcover" => Some(Self::Hardcover),
            "masterworks" => Some(Self::Masterworks),
            "compendium" => Some(Self::Compendium),
            "complete_collection" => Some(Self::CompleteCollection),
            "oversized_hardcover" | "ohc" => Some(Self::OversizedHardcover),
            _ => None,
        }
    }
}

/// A purchasable collected edition.
///
/// Immutable once ingested. The issue list keeps catalog order and is free
/// of duplicates; `Edition::new` merges repeats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edition {
    /// Stable identifier.
    pub id: EditionId,
    /// Human-readable title.
    pub title: String,
    /// Contained issues in catalog order, deduplicated.
    pub issues: Vec<IssueId>,
    /// Print availability.
    pub print_status: PrintStatus,
    /// Cover price in the catalog currency.
    pub cover_price: Option<f64>,
    /// Importance tier.
    pub importance: Importance,
    /// Physical format.
    pub format: Option<EditionFormat>,
    /// Cover image location.
    pub cover_image_url: Option<String>,
    /// ISBN.
    pub isbn: Option<String>,
    /// Release date.
    pub release_date: Option<NaiveDate>,
    /// Page count.
    pub page_count: Option<u32>,
    /// Synopsis text.
    pub synopsis: Option<String>,
}

impl Edition {
    /// Create a new edition with default metadata.
    pub fn new(id: impl Into<EditionId>, title: impl Into<String>, issues: Vec<IssueId>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            issues: dedup_issues(issues),
            print_status: PrintStatus::default(),
            cover_price: None,
            importance: Importance::default(),
            format: None,
            cover_image_url: None,
            isbn: None,
            release_date: None,
            page_count: None,
            synopsis: None,
        }
    }

    /// Set print status.
    pub fn with_print_status(mut self, status: PrintStatus) -> Self {
        self.print_status = status;
        self
    }

    /// Set cover price.
    pub fn with_cover_price(mut self, price: f64) -> Self {
        self.cover_price = Some(price);
        self
    }

    /// Set importance tier.
    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
    }

    /// Set cover image URL.
    pub fn with_cover_image(mut self, url: impl Into<String>) -> Self {
        self.cover_image_url = Some(url.into());
        self
    }

    /// Set ISBN.
    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    /// Number of distinct issues.
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    /// Whether a cover image is present.
    pub fn has_cover(&self) -> bool {
        self.cover_image_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }

    /// Count of populated optional fields.
    ///
    /// Used as the first criterion when choosing a canonical edition among
    /// duplicates.
    pub fn completeness(&self) -> usize {
        [
            self.cover_price.is_some(),
            self.has_cover(),
            self.isbn.as_deref().is_some_and(|s| !s.trim().is_empty()),
            self.release_date.is_some(),
            self.page_count.is_some(),
            self.synopsis.as_deref().is_some_and(|s| !s.trim().is_empty()),
            self.format.is_some(),
        ]
        .iter()
        .filter(|populated| **populated)
        .count()
    }

    /// Title normalized for duplicate grouping.
    pub fn normalized_title(&self) -> String {
        normalize_title(&self.title)
    }
}

/// Normalize a title: lowercase, punctuation dropped, whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn dedup_issues(issues: Vec<IssueId>) -> Vec<IssueId> {
    let mut seen = HashSet::with_capacity(issues.len());
    issues.into_iter().filter(|i| seen.insert(i.clone())).collect()
}
