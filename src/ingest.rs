//! Snapshot ingestion.
//!
//! The data store hands over loosely typed rows: ids that may be strings or
//! numbers, strengths on a declared scale, issue lists as free text. Everything
//! is validated here and converted into the strict internal types before
//! any graph algorithm runs. Validation never fails the snapshot; each
//! problem becomes a [`DataWarning`] and the offending value is dropped or
//! defaulted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::index::parse_issue_list;
use crate::types::{
    Connection, ConnectionType, DataWarning, Edition, EditionFormat, EditionId, Importance,
    IssueId, PrintStatus, SnapshotVersion,
};

/// Strength assigned to connections that carry none.
pub const DEFAULT_STRENGTH: f32 = 0.5;

/// Upper bound of the store's strength scale.
pub const STORE_STRENGTH_SCALE: f64 = 10.0;

/// Scale the connection strengths of a payload are expressed on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrengthScale {
    /// Already normalized to `[0, 1]`.
    #[default]
    Unit,
    /// The store's `[0, 10]` scale.
    Store,
}

impl StrengthScale {
    fn upper_bound(self) -> f64 {
        match self {
            Self::Unit => 1.0,
            Self::Store => STORE_STRENGTH_SCALE,
        }
    }
}

/// Issue row as stored in the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawIssue {
    /// Series name.
    #[serde(default)]
    pub series_name: String,
    /// Issue number, numeric or text.
    #[serde(default)]
    pub issue_number: Value,
    /// Annual flag.
    #[serde(default)]
    pub is_annual: bool,
}

/// Edition row as stored in the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEdition {
    /// Identifier, string or number.
    #[serde(default)]
    pub id: Value,
    /// URL slug; stands in for a missing id.
    #[serde(default)]
    pub slug: Option<String>,
    /// Title.
    #[serde(default)]
    pub title: Option<String>,
    /// Structured issue rows, when the store has them.
    #[serde(default)]
    pub issues: Option<Vec<RawIssue>>,
    /// Free-text issue list, parsed when `issues` is absent.
    #[serde(default)]
    pub issues_collected: Option<String>,
    /// Print status text.
    #[serde(default)]
    pub print_status: Option<String>,
    /// Cover price, number or numeric text.
    #[serde(default)]
    pub cover_price: Value,
    /// Importance text.
    #[serde(default)]
    pub importance: Option<String>,
    /// Format text.
    #[serde(default)]
    pub format: Option<String>,
    /// Cover image URL.
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// ISBN.
    #[serde(default)]
    pub isbn: Option<String>,
    /// Release date, `YYYY-MM-DD` or an RFC 3339 timestamp.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Page count.
    #[serde(default)]
    pub page_count: Value,
    /// Synopsis.
    #[serde(default)]
    pub synopsis: Option<String>,
}

/// Connection row as stored in the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConnection {
    /// Entity type of the source; only `edition` is routed.
    #[serde(default)]
    pub source_type: Option<String>,
    /// Source identifier.
    #[serde(default)]
    pub source_id: Value,
    /// Entity type of the target.
    #[serde(default)]
    pub target_type: Option<String>,
    /// Target identifier.
    #[serde(default)]
    pub target_id: Value,
    /// Relationship kind.
    #[serde(default)]
    pub connection_type: Option<String>,
    /// Strength on the snapshot's [`StrengthScale`].
    #[serde(default)]
    pub strength: Value,
}

/// Versioned catalog payload fetched from the data store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Monotonic catalog version.
    pub version: SnapshotVersion,
    /// When the payload was fetched.
    #[serde(default = "Utc::now")]
    pub fetched_at: DateTime<Utc>,
    /// Edition rows.
    #[serde(default)]
    pub editions: Vec<RawEdition>,
    /// Connection rows.
    #[serde(default)]
    pub connections: Vec<RawConnection>,
    /// Scale of every connection strength in this payload.
    #[serde(default)]
    pub strength_scale: StrengthScale,
}

/// Strictly typed snapshot contents.
#[derive(Debug, Clone, Default)]
pub struct ValidatedSnapshot {
    /// Editions in payload order, unique by id.
    pub editions: Vec<Edition>,
    /// Connections with parsed type and normalized strength. Endpoints are
    /// checked when the graph is built.
    pub connections: Vec<Connection>,
    /// Problems found while validating.
    pub warnings: Vec<DataWarning>,
    /// Connections ignored because an endpoint is not an edition.
    pub skipped_non_edition: usize,
}

impl CatalogSnapshot {
    /// Create an empty snapshot at a version.
    pub fn new(version: SnapshotVersion) -> Self {
        Self {
            version,
            fetched_at: Utc::now(),
            editions: Vec::new(),
            connections: Vec::new(),
            strength_scale: StrengthScale::Unit,
        }
    }

    /// Validate every row into internal types.
    pub fn validate(&self) -> ValidatedSnapshot {
        let mut out = ValidatedSnapshot::default();
        let mut seen = HashSet::with_capacity(self.editions.len());

        for (row, raw) in self.editions.iter().enumerate() {
            let Some(edition) = validate_edition(row, raw, &mut out.warnings) else {
                continue;
            };
            if !seen.insert(edition.id.clone()) {
                out.warnings
                    .push(DataWarning::malformed(&edition.id, "duplicate edition id; first row kept"));
                continue;
            }
            out.editions.push(edition);
        }

        for raw in &self.connections {
            if !is_edition_endpoint(&raw.source_type) || !is_edition_endpoint(&raw.target_type) {
                out.skipped_non_edition += 1;
                continue;
            }
            match validate_connection(raw, self.strength_scale) {
                Ok(connection) => out.connections.push(connection),
                Err(warning) => out.warnings.push(warning),
            }
        }

        out
    }
}

fn is_edition_endpoint(kind: &Option<String>) -> bool {
    kind.as_deref()
        .map_or(true, |k| k.trim().eq_ignore_ascii_case("edition"))
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn validate_edition(row: usize, raw: &RawEdition, warnings: &mut Vec<DataWarning>) -> Option<Edition> {
    let id = match value_to_id(&raw.id).or_else(|| non_empty(&raw.slug)) {
        Some(id) => EditionId::new(id),
        None => {
            warnings.push(DataWarning::malformed(
                &EditionId::new(format!("row-{}", row)),
                "edition row has no id or slug",
            ));
            return None;
        }
    };

    let title = non_empty(&raw.title).unwrap_or_else(|| id.to_string());
    let issues = validate_issues(&id, raw, warnings);
    let mut edition = Edition::new(id, title, issues);

    if let Some(status) = non_empty(&raw.print_status) {
        match PrintStatus::from_str(&status) {
            Some(s) => edition.print_status = s,
            None => warnings.push(DataWarning::malformed(
                &edition.id,
                format!("unknown print status '{}'", status),
            )),
        }
    }

    if let Some(importance) = non_empty(&raw.importance) {
        match Importance::from_str(&importance) {
            Some(i) => edition.importance = i,
            None => warnings.push(DataWarning::malformed(
                &edition.id,
                format!("unknown importance '{}'", importance),
            )),
        }
    }

    match parse_price(&raw.cover_price) {
        Ok(price) => edition.cover_price = price,
        Err(reason) => warnings.push(DataWarning::malformed(&edition.id, reason)),
    }

    edition.format = non_empty(&raw.format).and_then(|f| EditionFormat::from_str(&f));
    edition.cover_image_url = non_empty(&raw.cover_image_url);
    edition.isbn = non_empty(&raw.isbn);
    edition.synopsis = non_empty(&raw.synopsis);
    edition.release_date = non_empty(&raw.release_date).and_then(|d| parse_date(&d));
    edition.page_count = raw
        .page_count
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n > 0);

    Some(edition)
}

fn validate_issues(id: &EditionId, raw: &RawEdition, warnings: &mut Vec<DataWarning>) -> Vec<IssueId> {
    if let Some(rows) = raw.issues.as_ref().filter(|rows| !rows.is_empty()) {
        let mut issues = Vec::with_capacity(rows.len());
        for issue in rows {
            let number = match &issue.issue_number {
                Value::Number(n) => Some(n.to_string()),
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            };
            match number {
                Some(number) if !issue.series_name.trim().is_empty() => {
                    issues.push(IssueId::new(&issue.series_name, number, issue.is_annual));
                }
                _ => warnings.push(DataWarning::malformed(
                    id,
                    format!(
                        "issue row missing series or number ('{}' {})",
                        issue.series_name, issue.issue_number
                    ),
                )),
            }
        }
        return issues;
    }

    let Some(text) = non_empty(&raw.issues_collected) else {
        return Vec::new();
    };
    let parsed = parse_issue_list(&text);
    for rejected in parsed.rejected {
        warnings.push(DataWarning::malformed(
            id,
            format!("unreadable issue segment '{}': {}", rejected.segment, rejected.reason),
        ));
    }
    parsed.issues
}

fn parse_price(value: &Value) -> Result<Option<f64>, String> {
    let price = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().trim_start_matches('$').parse().ok(),
        _ => None,
    };
    match price {
        Some(p) if p.is_finite() && p >= 0.0 => Ok(Some(p)),
        _ => Err(format!("invalid cover price {}", value)),
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn validate_connection(raw: &RawConnection, scale: StrengthScale) -> Result<Connection, DataWarning> {
    let from = EditionId::new(value_to_id(&raw.source_id).unwrap_or_default());
    let to = EditionId::new(value_to_id(&raw.target_id).unwrap_or_default());

    if from.as_str().is_empty() || to.as_str().is_empty() {
        return Err(DataWarning::invalid_connection(&from, &to, None, "missing endpoint id"));
    }

    let kind = non_empty(&raw.connection_type).unwrap_or_else(|| "leads_to".to_string());
    let connection_type = ConnectionType::from_str(&kind).ok_or_else(|| {
        DataWarning::invalid_connection(&from, &to, None, format!("unknown connection type '{}'", kind))
    })?;

    let strength = normalize_strength(&raw.strength, scale)
        .map_err(|reason| DataWarning::invalid_connection(&from, &to, Some(connection_type), reason))?;

    Ok(Connection::new(from, to, connection_type, strength))
}

/// Map a strength on `scale` onto `[0, 1]`.
///
/// Store strengths are divided by ten, so `1` on the store scale is `0.1`.
/// Values outside the scale are rejected. A missing strength gets
/// [`DEFAULT_STRENGTH`].
pub fn normalize_strength(value: &Value, scale: StrengthScale) -> Result<f32, String> {
    let raw = match value {
        Value::Null => return Ok(DEFAULT_STRENGTH),
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| format!("strength {} is not a number", value))?;

    let bound = scale.upper_bound();
    if !raw.is_finite() || raw < 0.0 || raw > bound {
        return Err(format!("strength {} outside [0, {}]", raw, bound));
    }
    Ok((raw / bound) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(value: Value) -> CatalogSnapshot {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_structured_and_text_issue_lists() {
        let snap = snapshot(json!({
            "version": 3,
            "editions": [
                {
                    "id": "a",
                    "title": "FF Omnibus",
                    "issues": [
                        {"series_name": "Fantastic Four", "issue_number": 1},
                        {"series_name": "Fantastic Four", "issue_number": "2"}
                    ]
                },
                {"id": 42, "title": "FF Epic", "issues_collected": "FF #3-4"}
            ]
        }));
        let validated = snap.validate();
        assert!(validated.warnings.is_empty());
        assert_eq!(validated.editions.len(), 2);
        assert_eq!(validated.editions[0].issue_count(), 2);
        assert_eq!(validated.editions[1].id.as_str(), "42");
        assert_eq!(validated.editions[1].issues[1], IssueId::new("Fantastic Four", "4", false));
    }

    #[test]
    fn test_edition_metadata_defaults_and_warnings() {
        let snap = snapshot(json!({
            "version": 1,
            "editions": [{
                "slug": "x-men-omnibus",
                "issues_collected": "X-Men #1-3",
                "print_status": "pulped",
                "cover_price": "$125.00",
                "release_date": "2023-04-11"
            }]
        }));
        let validated = snap.validate();
        let edition = &validated.editions[0];
        assert_eq!(edition.id.as_str(), "x-men-omnibus");
        assert_eq!(edition.title, "x-men-omnibus");
        assert_eq!(edition.print_status, PrintStatus::Unknown);
        assert_eq!(edition.importance, Importance::Recommended);
        assert_eq!(edition.cover_price, Some(125.0));
        assert!(edition.release_date.is_some());
        assert_eq!(validated.warnings.len(), 1);
    }

    #[test]
    fn test_duplicate_edition_ids_keep_first() {
        let snap = snapshot(json!({
            "version": 1,
            "editions": [
                {"id": "a", "title": "First", "issues_collected": "FF #1"},
                {"id": "a", "title": "Second", "issues_collected": "FF #2"}
            ]
        }));
        let validated = snap.validate();
        assert_eq!(validated.editions.len(), 1);
        assert_eq!(validated.editions[0].title, "First");
        assert_eq!(validated.warnings.len(), 1);
    }

    #[test]
    fn test_connection_mapping_and_strength_scale() {
        let snap = snapshot(json!({
            "version": 1,
            "strength_scale": "store",
            "connections": [
                {"source_id": "a", "target_id": "b", "connection_type": "recommended_after", "strength": 9},
                {"source_id": "b", "target_id": "c", "connection_type": "ties_into", "strength": 4},
                {"source_id": "c", "target_id": "d"},
                {"source_type": "event", "source_id": "e1", "target_type": "edition", "target_id": "a"},
                {"source_id": "a", "target_id": "c", "connection_type": "sequel_of"},
                {"source_id": "a", "target_id": "d", "strength": 11}
            ]
        }));
        let validated = snap.validate();
        assert_eq!(validated.skipped_non_edition, 1);
        assert_eq!(validated.connections.len(), 3);
        assert_eq!(validated.connections[0].connection_type, ConnectionType::LeadsTo);
        assert!((validated.connections[0].strength - 0.9).abs() < 1e-6);
        assert_eq!(validated.connections[1].connection_type, ConnectionType::Crossover);
        assert!((validated.connections[2].strength - DEFAULT_STRENGTH).abs() < 1e-6);
        assert_eq!(validated.warnings.len(), 2);
        assert!(validated.warnings.iter().all(|w| w.kind() == "invalid_connection"));
    }

    #[test]
    fn test_normalize_strength_bounds() {
        assert_eq!(normalize_strength(&json!(1), StrengthScale::Unit).unwrap(), 1.0);
        assert_eq!(normalize_strength(&json!(10), StrengthScale::Store).unwrap(), 1.0);
        assert!(normalize_strength(&json!(-0.1), StrengthScale::Unit).is_err());
        assert!(normalize_strength(&json!("strong"), StrengthScale::Store).is_err());
        assert_eq!(
            normalize_strength(&Value::Null, StrengthScale::Store).unwrap(),
            DEFAULT_STRENGTH
        );
    }

    #[test]
    fn test_store_scale_keeps_order_below_two() {
        let weak = normalize_strength(&json!(1), StrengthScale::Store).unwrap();
        let strong = normalize_strength(&json!(9), StrengthScale::Store).unwrap();
        assert!((weak - 0.1).abs() < 1e-6);
        assert!((strong - 0.9).abs() < 1e-6);
        assert!(weak < strong);

        assert!(normalize_strength(&json!(9), StrengthScale::Unit).is_err());
        assert!(normalize_strength(&json!(11), StrengthScale::Store).is_err());
    }

    #[test]
    fn test_strength_scale_defaults_to_unit() {
        let snap = snapshot(json!({
            "version": 1,
            "connections": [
                {"source_id": "a", "target_id": "b", "strength": 1},
                {"source_id": "b", "target_id": "c", "strength": 9}
            ]
        }));
        assert_eq!(snap.strength_scale, StrengthScale::Unit);
        let validated = snap.validate();
        assert_eq!(validated.connections.len(), 1);
        assert_eq!(validated.connections[0].strength, 1.0);
        assert_eq!(validated.warnings.len(), 1);
    }

    #[test]
    fn test_unreadable_segments_reported() {
        let snap = snapshot(json!({
            "version": 1,
            "editions": [{"id": "a", "title": "A", "issues_collected": "FF #1, #"}]
        }));
        let validated = snap.validate();
        assert_eq!(validated.editions[0].issue_count(), 1);
        assert_eq!(validated.warnings.len(), 1);
        assert_eq!(validated.warnings[0].kind(), "malformed_content");
    }
}
