//! Issue Index.
//!
//! Forward map from edition to its canonical issue set, plus the inverted
//! map from issue to the editions containing it. The inverted side lets
//! overlap queries touch only the issues of the smaller edition instead of
//! rescanning the catalog.

pub mod parser;

pub use parser::{parse_issue_list, ParsedIssueList, RejectedSegment};

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{DataWarning, Edition, EditionId, IssueId};

/// Forward and inverted issue index over one snapshot.
#[derive(Debug, Clone, Default)]
pub struct IssueIndex {
    by_edition: BTreeMap<EditionId, BTreeSet<IssueId>>,
    by_issue: BTreeMap<IssueId, BTreeSet<EditionId>>,
}

impl IssueIndex {
    /// Build the index.
    ///
    /// Editions declaring no issues are left out and reported as
    /// `MalformedContent`. Repeated edition ids keep the first occurrence.
    pub fn build(editions: &[Edition]) -> (Self, Vec<DataWarning>) {
        let mut index = Self::default();
        let mut warnings = Vec::new();

        for edition in editions {
            if edition.issues.is_empty() {
                warnings.push(DataWarning::malformed(&edition.id, "edition declares no issues"));
                continue;
            }
            if index.by_edition.contains_key(&edition.id) {
                warnings.push(DataWarning::malformed(&edition.id, "duplicate edition id"));
                continue;
            }

            let issues: BTreeSet<IssueId> = edition.issues.iter().cloned().collect();
            for issue in &issues {
                index
                    .by_issue
                    .entry(issue.clone())
                    .or_default()
                    .insert(edition.id.clone());
            }
            index.by_edition.insert(edition.id.clone(), issues);
        }

        (index, warnings)
    }

    /// Canonical issue set of an edition.
    pub fn issues(&self, edition: &EditionId) -> Option<&BTreeSet<IssueId>> {
        self.by_edition.get(edition)
    }

    /// Editions containing an issue.
    pub fn editions_containing(&self, issue: &IssueId) -> Option<&BTreeSet<EditionId>> {
        self.by_issue.get(issue)
    }

    /// Whether an edition is indexed.
    pub fn contains(&self, edition: &EditionId) -> bool {
        self.by_edition.contains_key(edition)
    }

    /// Indexed edition ids in canonical order.
    pub fn edition_ids(&self) -> impl Iterator<Item = &EditionId> {
        self.by_edition.keys()
    }

    /// Number of indexed editions.
    pub fn len(&self) -> usize {
        self.by_edition.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.by_edition.is_empty()
    }

    /// Number of distinct issues across the catalog.
    pub fn issue_count(&self) -> usize {
        self.by_issue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ff(n: &str) -> IssueId {
        IssueId::new("Fantastic Four", n, false)
    }

    #[test]
    fn test_inverted_index() {
        let editions = vec![
            Edition::new("a", "A", vec![ff("1"), ff("2")]),
            Edition::new("b", "B", vec![ff("1"), ff("2"), ff("3")]),
        ];
        let (index, warnings) = IssueIndex::build(&editions);
        assert!(warnings.is_empty());
        assert_eq!(index.len(), 2);
        assert_eq!(index.issue_count(), 3);

        let holders: Vec<&str> = index
            .editions_containing(&ff("1"))
            .unwrap()
            .iter()
            .map(|e| e.as_str())
            .collect();
        assert_eq!(holders, vec!["a", "b"]);
        assert_eq!(index.editions_containing(&ff("3")).unwrap().len(), 1);
        assert!(index.editions_containing(&ff("9")).is_none());
    }

    #[test]
    fn test_empty_edition_reported_not_dropped_silently() {
        let editions = vec![
            Edition::new("empty", "Empty", vec![]),
            Edition::new("a", "A", vec![ff("1")]),
        ];
        let (index, warnings) = IssueIndex::build(&editions);
        assert!(!index.contains(&EditionId::new("empty")));
        assert!(index.contains(&EditionId::new("a")));
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            DataWarning::MalformedContent { edition, .. } if edition.as_str() == "empty"
        ));
    }
}
