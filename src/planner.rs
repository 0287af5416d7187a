//! Purchase Planner.
//!
//! Partitions a reading path against the reader's collection and prices
//! what is left to buy.
//!
//! ## Skippable detection
//!
//! Finding the cheapest set of editions that covers every remaining issue
//! is set cover, which is NP-hard. The planner uses a greedy pass instead:
//!
//! 1. Purchase candidates (partially owned and unowned editions) are
//!    visited from highest to lowest canonical rank (completeness, cover
//!    image, smallest id).
//! 2. A candidate X is skippable, covered by an earlier required candidate
//!    F, when X duplicates content (its overlap with F, or its coverage by
//!    the collection, reaches the duplicate threshold) and every issue of
//!    X not already owned is in F.
//! 3. Otherwise X becomes required and can cover later candidates.
//!
//! The result is not guaranteed minimal. A candidate judged required early
//! is never revisited, even if a later combination would have covered it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

use crate::graph::EditionGraph;
use crate::index::IssueIndex;
use crate::overlap::{Contributor, OverlapEngine, OverlapError};
use crate::types::{Edition, EditionId, IssueId, PrintStatus};

/// Error type for planning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// A path edition is not in the catalog.
    #[error("Edition not found: {0}")]
    UnknownEdition(EditionId),
    /// Planning arguments cannot be evaluated.
    #[error("Invalid plan request: {0}")]
    InvalidRequest(String),
}

impl From<OverlapError> for PlanError {
    fn from(e: OverlapError) -> Self {
        match e {
            OverlapError::UnknownEdition(id) => Self::UnknownEdition(id),
            OverlapError::EmptyGroup => Self::InvalidRequest(e.to_string()),
        }
    }
}

/// One edition placed in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Edition id.
    pub edition: EditionId,
    /// Title.
    pub title: String,
    /// Print status.
    pub print_status: PrintStatus,
    /// Cover price.
    pub cover_price: Option<f64>,
    /// Percentage of its issues already owned.
    pub coverage_pct: f64,
    /// Owned editions supplying that coverage.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub contributors: Vec<Contributor>,
}

/// Unowned editions by print status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnownedBuckets {
    /// In print.
    pub in_print: Vec<PlanEntry>,
    /// Out of print.
    pub out_of_print: Vec<PlanEntry>,
    /// Upcoming.
    pub upcoming: Vec<PlanEntry>,
    /// Digital only.
    pub digital_only: Vec<PlanEntry>,
    /// Ongoing.
    pub ongoing: Vec<PlanEntry>,
    /// Availability unknown.
    pub unknown: Vec<PlanEntry>,
}

impl UnownedBuckets {
    fn push(&mut self, entry: PlanEntry) {
        match entry.print_status {
            PrintStatus::InPrint => self.in_print.push(entry),
            PrintStatus::OutOfPrint => self.out_of_print.push(entry),
            PrintStatus::Upcoming => self.upcoming.push(entry),
            PrintStatus::DigitalOnly => self.digital_only.push(entry),
            PrintStatus::Ongoing => self.ongoing.push(entry),
            PrintStatus::Unknown => self.unknown.push(entry),
        }
    }

    /// All unowned entries, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = &PlanEntry> {
        self.in_print
            .iter()
            .chain(&self.out_of_print)
            .chain(&self.upcoming)
            .chain(&self.digital_only)
            .chain(&self.ongoing)
            .chain(&self.unknown)
    }

    /// Number of unowned entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether there are no unowned entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A purchase the reader can skip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippableEntry {
    /// The skippable edition.
    pub edition: EditionId,
    /// The required edition that supplies its remaining issues.
    pub covered_by: EditionId,
    /// Duplicate evidence that qualified it, as a percentage.
    pub overlap_pct: f64,
}

/// Purchase plan for a reading path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchasePlan {
    /// Owned directly, or every issue already owned through other editions.
    pub owned: Vec<PlanEntry>,
    /// Partly covered by the collection.
    pub partially_owned: Vec<PlanEntry>,
    /// Not covered at all.
    pub unowned: UnownedBuckets,
    /// Cover price of unowned editions that are not digital-only.
    pub total_cost: f64,
    /// `total_cost` without skippable editions.
    pub required_cost: f64,
    /// Unowned physical editions with no cover price.
    pub unpriced: Vec<EditionId>,
    /// Purchases that can be skipped.
    pub skippable: Vec<SkippableEntry>,
    /// Owned ids that are not in the catalog.
    pub ignored_owned: Vec<EditionId>,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Plans purchases over one catalog.
pub struct PurchasePlanner<'a> {
    graph: &'a EditionGraph,
    index: &'a IssueIndex,
    duplicate_threshold: f64,
}

impl<'a> PurchasePlanner<'a> {
    /// Create a planner. `duplicate_threshold` is a `[0, 1]` fraction.
    pub fn new(graph: &'a EditionGraph, index: &'a IssueIndex, duplicate_threshold: f64) -> Self {
        Self {
            graph,
            index,
            duplicate_threshold,
        }
    }

    fn edition(&self, id: &EditionId) -> Result<&'a Edition, PlanError> {
        self.graph
            .edition(id)
            .ok_or_else(|| PlanError::UnknownEdition(id.clone()))
    }

    /// Build the plan for `path` given the `owned` collection.
    ///
    /// Repeated path entries are planned once. `owned` ids not in the
    /// catalog are ignored and listed.
    pub fn plan(&self, path: &[EditionId], owned: &[EditionId]) -> Result<PurchasePlan, PlanError> {
        let overlap = OverlapEngine::new(self.graph, self.index);
        let owned_set: HashSet<&EditionId> = owned.iter().collect();
        let mut plan = PurchasePlan::default();

        let mut seen = HashSet::new();
        let mut candidates: Vec<(&'a Edition, f64, Vec<IssueId>)> = Vec::new();
        for id in path.iter().filter(|id| seen.insert(*id)) {
            let edition = self.edition(id)?;
            let coverage = overlap.aggregate(id, owned)?;
            if plan.ignored_owned.is_empty() {
                plan.ignored_owned = coverage.ignored_owned.clone();
            }

            let direct = owned_set.contains(id);
            let entry = PlanEntry {
                edition: id.clone(),
                title: edition.title.clone(),
                print_status: edition.print_status,
                cover_price: edition.cover_price,
                coverage_pct: if direct { 100.0 } else { coverage.pct_covered },
                contributors: if direct { Vec::new() } else { coverage.contributors },
            };

            if direct || coverage.covered.len() == coverage.total_issues {
                plan.owned.push(entry);
                continue;
            }

            let covered: BTreeSet<&IssueId> = coverage.covered.iter().collect();
            let remainder: Vec<IssueId> = self
                .index
                .issues(id)
                .into_iter()
                .flatten()
                .filter(|issue| !covered.contains(issue))
                .cloned()
                .collect();
            candidates.push((edition, coverage.pct_covered, remainder));

            if coverage.covered.is_empty() {
                plan.unowned.push(entry);
            } else {
                plan.partially_owned.push(entry);
            }
        }

        plan.skippable = self.find_skippable(&overlap, candidates)?;

        let skipped: HashSet<&EditionId> = plan.skippable.iter().map(|s| &s.edition).collect();
        let mut total = 0.0;
        let mut required = 0.0;
        for entry in plan.unowned.iter().filter(|e| e.print_status.is_physical()) {
            match entry.cover_price {
                Some(price) => {
                    total += price;
                    if !skipped.contains(&entry.edition) {
                        required += price;
                    }
                }
                None => plan.unpriced.push(entry.edition.clone()),
            }
        }
        plan.total_cost = round_cents(total);
        plan.required_cost = round_cents(required);

        debug!(
            path_len = path.len(),
            owned = plan.owned.len(),
            partially_owned = plan.partially_owned.len(),
            unowned = plan.unowned.len(),
            skippable = plan.skippable.len(),
            total_cost = plan.total_cost,
            "purchase plan built"
        );
        Ok(plan)
    }

    fn find_skippable(
        &self,
        overlap: &OverlapEngine<'a>,
        mut candidates: Vec<(&'a Edition, f64, Vec<IssueId>)>,
    ) -> Result<Vec<SkippableEntry>, PlanError> {
        candidates.sort_by(|(a, _, _), (b, _, _)| {
            (b.completeness(), b.has_cover())
                .cmp(&(a.completeness(), a.has_cover()))
                .then_with(|| a.id.cmp(&b.id))
        });

        let threshold = self.duplicate_threshold * 100.0;
        let mut required: Vec<&'a Edition> = Vec::new();
        let mut skippable = Vec::new();

        for (edition, owned_pct, remainder) in candidates {
            let mut cover = None;
            for keeper in &required {
                let pair = overlap.pairwise(&edition.id, &keeper.id)?;
                let evidence = pair.pct_of_a.max(owned_pct);
                if evidence < threshold {
                    continue;
                }
                let keeper_issues = self.index.issues(&keeper.id);
                let supplies_rest = keeper_issues.is_some_and(|set| remainder.iter().all(|i| set.contains(i)));
                if supplies_rest {
                    cover = Some((keeper.id.clone(), evidence));
                    break;
                }
            }

            match cover {
                Some((covered_by, overlap_pct)) => skippable.push(SkippableEntry {
                    edition: edition.id.clone(),
                    covered_by,
                    overlap_pct,
                }),
                None => required.push(edition),
            }
        }

        skippable.sort_by(|a, b| a.edition.cmp(&b.edition));
        Ok(skippable)
    }
}
