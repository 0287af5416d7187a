//! Issue identity.
//!
//! An issue is the atomic unit of content: a (series, number, annual) triple.
//! Two issues are equal when all three match, comparing series names
//! case-insensitively with whitespace collapsed.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Canonical identifier of a single issue.
///
/// Keeps the series name as first seen for display, and a normalized key
/// for equality, hashing and ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "IssueParts", into = "IssueParts")]
pub struct IssueId {
    series: String,
    series_key: String,
    number: String,
    annual: bool,
}

/// Wire form of an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IssueParts {
    series: String,
    number: String,
    #[serde(default)]
    annual: bool,
}

impl From<IssueParts> for IssueId {
    fn from(parts: IssueParts) -> Self {
        Self::new(&parts.series, &parts.number, parts.annual)
    }
}

impl From<IssueId> for IssueParts {
    fn from(id: IssueId) -> Self {
        Self {
            series: id.series,
            number: id.number,
            annual: id.annual,
        }
    }
}

impl IssueId {
    /// Create a new issue identifier.
    ///
    /// The number is canonicalized: a leading `#` is dropped and leading
    /// zeros of the integer part are stripped (`"007"` → `"7"`).
    pub fn new(series: &str, number: impl AsRef<str>, annual: bool) -> Self {
        let series = series.split_whitespace().collect::<Vec<_>>().join(" ");
        Self {
            series_key: series.to_lowercase(),
            series,
            number: canonical_number(number.as_ref()),
            annual,
        }
    }

    /// Series name as displayed.
    pub fn series(&self) -> &str {
        &self.series
    }

    /// Canonical issue number.
    pub fn number(&self) -> &str {
        &self.number
    }

    /// Whether this is an annual.
    pub fn is_annual(&self) -> bool {
        self.annual
    }

    /// Numeric sort key: (whole, fraction) when the number parses.
    fn numeric_key(&self) -> Option<(u64, u64)> {
        let (whole, frac) = match self.number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (self.number.as_str(), "0"),
        };
        Some((whole.parse().ok()?, frac.parse().ok()?))
    }
}

fn canonical_number(raw: &str) -> String {
    let raw = raw.trim().trim_start_matches('#').trim();
    let (whole, rest) = match raw.find('.') {
        Some(pos) => raw.split_at(pos),
        None => (raw, ""),
    };
    if !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()) {
        let trimmed = whole.trim_start_matches('0');
        let whole = if trimmed.is_empty() { "0" } else { trimmed };
        format!("{}{}", whole, rest)
    } else {
        raw.to_string()
    }
}

impl PartialEq for IssueId {
    fn eq(&self, other: &Self) -> bool {
        self.series_key == other.series_key
            && self.annual == other.annual
            && self.number == other.number
    }
}

impl Eq for IssueId {}

impl Hash for IssueId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.series_key.hash(state);
        self.annual.hash(state);
        self.number.hash(state);
    }
}

impl PartialOrd for IssueId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Canonical ordering: series, then regular before annual, then numeric
// issue order with the raw number as a final tie-break.
impl Ord for IssueId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.series_key
            .cmp(&other.series_key)
            .then_with(|| self.annual.cmp(&other.annual))
            .then_with(|| match (self.numeric_key(), other.numeric_key()) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.number.cmp(&other.number))
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.annual {
            write!(f, "{} Annual #{}", self.series, self.number)
        } else {
            write!(f, "{} #{}", self.series, self.number)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_series_comparison_is_case_insensitive() {
        let a = IssueId::new("Fantastic Four", "1", false);
        let b = IssueId::new("FANTASTIC  four", "#001", false);
        assert_eq!(a, b);
    }

    #[test]
    fn test_annual_flag_distinguishes() {
        let regular = IssueId::new("Fantastic Four", "1", false);
        let annual = IssueId::new("Fantastic Four", "1", true);
        assert_ne!(regular, annual);
        assert_eq!(annual.to_string(), "Fantastic Four Annual #1");
    }

    #[test]
    fn test_numeric_ordering() {
        let set: BTreeSet<IssueId> = ["10", "2", "7.1", "7", "1"]
            .iter()
            .map(|n| IssueId::new("Avengers", n, false))
            .collect();
        let order: Vec<&str> = set.iter().map(|i| i.number()).collect();
        assert_eq!(order, vec!["1", "2", "7", "7.1", "10"]);
    }

    #[test]
    fn test_serde_roundtrip_keeps_identity() {
        let issue = IssueId::new("Uncanny X-Men", "141", false);
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"series\":\"Uncanny X-Men\""));
        let back: IssueId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, issue);
    }
}
