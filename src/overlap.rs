//! Overlap Engine.
//!
//! Issue-level content overlap between editions. Pairwise intersections
//! walk the smaller issue set and probe the inverted index, so cost is
//! bounded by the smaller edition rather than the catalog.
//!
//! Percentages are on a 0–100 scale and unrounded.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::graph::EditionGraph;
use crate::index::IssueIndex;
use crate::types::{normalize_title, Edition, EditionId, IssueId};

/// Error type for overlap operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlapError {
    /// Edition not in the catalog.
    #[error("Edition not found: {0}")]
    UnknownEdition(EditionId),
    /// Canonical selection over no editions.
    #[error("Duplicate group is empty")]
    EmptyGroup,
}

/// Overlap of an ordered pair of editions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairOverlap {
    /// First edition.
    pub edition_a: EditionId,
    /// Second edition.
    pub edition_b: EditionId,
    /// Shared issues in canonical order.
    pub shared: Vec<IssueId>,
    /// Number of shared issues.
    pub shared_count: usize,
    /// Shared issues as a percentage of A's issues.
    pub pct_of_a: f64,
    /// Shared issues as a percentage of B's issues.
    pub pct_of_b: f64,
}

/// An owned edition contributing to aggregate coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    /// Owned edition.
    pub edition: EditionId,
    /// Candidate issues it contains.
    pub count: usize,
}

/// Coverage of one edition by a set of owned editions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateOverlap {
    /// The candidate edition.
    pub edition: EditionId,
    /// Candidate issues already owned, in canonical order.
    pub covered: Vec<IssueId>,
    /// Candidate issue count.
    pub total_issues: usize,
    /// Covered issues as a percentage of the candidate.
    pub pct_covered: f64,
    /// Contributing owned editions, by count descending then most recent.
    pub contributors: Vec<Contributor>,
    /// Owned ids that are not in the catalog.
    pub ignored_owned: Vec<EditionId>,
}

/// An edition sharing content with a queried edition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarEdition {
    /// The other edition.
    pub edition: EditionId,
    /// Its title.
    pub title: String,
    /// Shared issue count.
    pub shared_count: usize,
    /// Shared issues as a percentage of the queried edition.
    pub pct_of_query: f64,
    /// Shared issues as a percentage of the other edition.
    pub pct_of_other: f64,
}

/// Outcome of canonical selection among duplicates.
///
/// Editions in `remove` are reported, never deleted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateResolution {
    /// The edition to keep.
    pub canonical: EditionId,
    /// The rest, in id order.
    pub remove: Vec<EditionId>,
}

/// A cluster of duplicate editions found in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Shared normalized title.
    pub normalized_title: String,
    /// Resolution for the cluster.
    #[serde(flatten)]
    pub resolution: DuplicateResolution,
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

/// Canonical-selection key; larger wins. Completeness, then cover image,
/// then the smaller id.
fn canonical_rank(edition: &Edition) -> (usize, bool, std::cmp::Reverse<&EditionId>) {
    (edition.completeness(), edition.has_cover(), std::cmp::Reverse(&edition.id))
}

/// Overlap queries over one catalog.
pub struct OverlapEngine<'a> {
    graph: &'a EditionGraph,
    index: &'a IssueIndex,
}

impl<'a> OverlapEngine<'a> {
    /// Create an overlap engine.
    pub fn new(graph: &'a EditionGraph, index: &'a IssueIndex) -> Self {
        Self { graph, index }
    }

    fn issues(&self, id: &EditionId) -> Result<&'a BTreeSet<IssueId>, OverlapError> {
        self.index
            .issues(id)
            .ok_or_else(|| OverlapError::UnknownEdition(id.clone()))
    }

    fn edition(&self, id: &EditionId) -> Result<&'a Edition, OverlapError> {
        self.graph
            .edition(id)
            .ok_or_else(|| OverlapError::UnknownEdition(id.clone()))
    }

    /// Pairwise overlap of A and B.
    ///
    /// The shared set is symmetric; the two percentages generally are not.
    pub fn pairwise(&self, a: &EditionId, b: &EditionId) -> Result<PairOverlap, OverlapError> {
        let issues_a = self.issues(a)?;
        let issues_b = self.issues(b)?;

        let (small, other) = if issues_a.len() <= issues_b.len() {
            (issues_a, b)
        } else {
            (issues_b, a)
        };
        let shared: Vec<IssueId> = small
            .iter()
            .filter(|issue| {
                self.index
                    .editions_containing(issue)
                    .is_some_and(|holders| holders.contains(other))
            })
            .cloned()
            .collect();

        Ok(PairOverlap {
            edition_a: a.clone(),
            edition_b: b.clone(),
            shared_count: shared.len(),
            pct_of_a: pct(shared.len(), issues_a.len()),
            pct_of_b: pct(shared.len(), issues_b.len()),
            shared,
        })
    }

    /// Number of issues shared by A and B.
    pub fn shared_count(&self, a: &EditionId, b: &EditionId) -> Result<usize, OverlapError> {
        Ok(self.pairwise(a, b)?.shared_count)
    }

    /// How much of a candidate is covered by owned editions.
    ///
    /// `owned` is in acquisition order: later entries are more recent. Ids
    /// not in the catalog are listed in `ignored_owned` and otherwise
    /// skipped. An empty owned set yields zero coverage.
    pub fn aggregate(&self, candidate: &EditionId, owned: &[EditionId]) -> Result<AggregateOverlap, OverlapError> {
        let issues = self.issues(candidate)?;

        // Most recent position wins for repeated ids.
        let mut recency: HashMap<&EditionId, usize> = HashMap::new();
        let mut ignored = BTreeSet::new();
        for (pos, id) in owned.iter().enumerate() {
            if self.index.contains(id) {
                recency.insert(id, pos);
            } else {
                ignored.insert(id.clone());
            }
        }

        let mut covered = Vec::new();
        let mut counts: BTreeMap<&EditionId, usize> = BTreeMap::new();
        for issue in issues {
            let Some(holders) = self.index.editions_containing(issue) else {
                continue;
            };
            let mut is_covered = false;
            for holder in holders {
                if recency.contains_key(holder) {
                    *counts.entry(holder).or_default() += 1;
                    is_covered = true;
                }
            }
            if is_covered {
                covered.push(issue.clone());
            }
        }

        let mut contributors: Vec<(Contributor, usize)> = counts
            .into_iter()
            .map(|(edition, count)| {
                let pos = recency.get(edition).copied().unwrap_or_default();
                (
                    Contributor {
                        edition: edition.clone(),
                        count,
                    },
                    pos,
                )
            })
            .collect();
        contributors.sort_by(|(a, pos_a), (b, pos_b)| {
            b.count
                .cmp(&a.count)
                .then_with(|| pos_b.cmp(pos_a))
                .then_with(|| a.edition.cmp(&b.edition))
        });

        Ok(AggregateOverlap {
            edition: candidate.clone(),
            pct_covered: pct(covered.len(), issues.len()),
            total_issues: issues.len(),
            covered,
            contributors: contributors.into_iter().map(|(c, _)| c).collect(),
            ignored_owned: ignored.into_iter().collect(),
        })
    }

    /// Editions sharing content with `id`.
    ///
    /// Kept when either side's overlap percentage reaches `min_ratio`
    /// (a `[0, 1]` fraction). Ranked by shared count, then id.
    pub fn similar(&self, id: &EditionId, min_ratio: f64) -> Result<Vec<SimilarEdition>, OverlapError> {
        let issues = self.issues(id)?;

        let mut shared: BTreeMap<&EditionId, usize> = BTreeMap::new();
        for issue in issues {
            if let Some(holders) = self.index.editions_containing(issue) {
                for holder in holders.iter().filter(|h| *h != id) {
                    *shared.entry(holder).or_default() += 1;
                }
            }
        }

        let threshold = min_ratio * 100.0;
        let mut similar: Vec<SimilarEdition> = shared
            .into_iter()
            .filter_map(|(other, count)| {
                let other_len = self.index.issues(other).map_or(0, |s| s.len());
                let pct_of_query = pct(count, issues.len());
                let pct_of_other = pct(count, other_len);
                (pct_of_query >= threshold || pct_of_other >= threshold).then(|| SimilarEdition {
                    edition: other.clone(),
                    title: self.graph.edition(other).map(|e| e.title.clone()).unwrap_or_default(),
                    shared_count: count,
                    pct_of_query,
                    pct_of_other,
                })
            })
            .collect();
        similar.sort_by(|a, b| b.shared_count.cmp(&a.shared_count).then_with(|| a.edition.cmp(&b.edition)));
        Ok(similar)
    }

    /// Pick the canonical edition among mutual duplicates.
    ///
    /// Prefers more populated optional fields, then a cover image, then
    /// the smallest id.
    pub fn select_canonical(&self, group: &[EditionId]) -> Result<DuplicateResolution, OverlapError> {
        let mut editions = group
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|id| self.edition(id))
            .collect::<Result<Vec<_>, _>>()?;

        editions.sort_by(|a, b| canonical_rank(b).cmp(&canonical_rank(a)));
        let mut ranked = editions.into_iter();
        let canonical = ranked.next().ok_or(OverlapError::EmptyGroup)?.id.clone();
        let mut remove: Vec<EditionId> = ranked.map(|e| e.id.clone()).collect();
        remove.sort();

        Ok(DuplicateResolution { canonical, remove })
    }

    /// Duplicate clusters across the catalog.
    ///
    /// Editions are grouped by normalized title; within a group, two
    /// editions are linked when their shared issues reach `threshold` of
    /// the larger edition. Each connected cluster of two or more editions
    /// is resolved with [`Self::select_canonical`].
    pub fn duplicate_groups(&self, threshold: f64) -> Result<Vec<DuplicateGroup>, OverlapError> {
        let mut by_title: BTreeMap<String, Vec<&EditionId>> = BTreeMap::new();
        for edition in self.graph.editions() {
            by_title.entry(normalize_title(&edition.title)).or_default().push(&edition.id);
        }

        let mut groups = Vec::new();
        for (title, members) in by_title.into_iter().filter(|(_, m)| m.len() > 1) {
            let mut cluster: Vec<usize> = (0..members.len()).collect();
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    let overlap = self.pairwise(members[i], members[j])?;
                    // Shared over the larger edition is the smaller percentage.
                    let of_larger = overlap.pct_of_a.min(overlap.pct_of_b);
                    if of_larger >= threshold * 100.0 {
                        merge_clusters(&mut cluster, i, j);
                    }
                }
            }

            let mut clusters: BTreeMap<usize, Vec<EditionId>> = BTreeMap::new();
            for (i, id) in members.iter().enumerate() {
                clusters.entry(find_root(&cluster, i)).or_default().push((*id).clone());
            }
            for ids in clusters.into_values().filter(|ids| ids.len() > 1) {
                groups.push(DuplicateGroup {
                    normalized_title: title.clone(),
                    resolution: self.select_canonical(&ids)?,
                });
            }
        }

        groups.sort_by(|a, b| a.resolution.canonical.cmp(&b.resolution.canonical));
        Ok(groups)
    }
}

fn find_root(cluster: &[usize], mut i: usize) -> usize {
    while cluster[i] != i {
        i = cluster[i];
    }
    i
}

fn merge_clusters(cluster: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find_root(cluster, a), find_root(cluster, b));
    if ra != rb {
        cluster[ra.max(rb)] = ra.min(rb);
    }
}
