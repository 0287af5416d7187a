//! Path Finder.
//!
//! Pure traversals over a built [`EditionGraph`]:
//!
//! - what's next: direct leads-to / crossover successors, ranked
//! - shortest path: unweighted BFS over every type except optional
//! - prerequisite chain: reverse closure over prerequisite edges, with
//!   cycle detection
//! - reading path: best-first expansion from a start edition
//! - reading order: topological order of a set of editions
//!
//! Every operation is a function of (graph, start, parameters). Layered
//! traversals check the cancellation token between layers.

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::graph::EditionGraph;
use crate::policy::CyclePolicy;
use crate::types::{ConnectionFilter, ConnectionType, DataWarning, EditionId, Importance};

/// Score per unit of strength in reading-path ranking.
const STRENGTH_WEIGHT: f64 = 100.0;
/// Score lost per hop from the start edition.
const DEPTH_PENALTY: f64 = 20.0;
/// Score lost when a crossover is followed.
const CROSSOVER_PENALTY: f64 = 80.0;

/// Error type for path operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Edition not in the graph.
    #[error("Edition not found: {0}")]
    UnknownEdition(EditionId),
    /// The caller cancelled the traversal.
    #[error("Traversal cancelled")]
    Cancelled,
}

/// A ranked direct successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextRead {
    /// Successor edition.
    pub edition: EditionId,
    /// Its title.
    pub title: String,
    /// Connection type.
    pub connection_type: ConnectionType,
    /// Connection strength.
    pub strength: f32,
}

/// Result of a shortest-path query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PathOutcome {
    /// A route exists.
    Found {
        /// Editions from source to target inclusive.
        path: Vec<EditionId>,
        /// Number of connections followed.
        hops: usize,
    },
    /// No route exists.
    NoPath,
}

impl PathOutcome {
    /// Whether a route was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// An ancestor in a prerequisite chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestor {
    /// The prerequisite edition.
    pub edition: EditionId,
    /// Prerequisite hops from the queried edition.
    pub depth: u32,
}

/// Transitive prerequisites of an edition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteChain {
    /// Ancestors ordered by depth, then id.
    pub ancestors: Vec<Ancestor>,
    /// Whether the cycle policy withheld the ancestors.
    pub blocked: bool,
    /// One `CycleDetected` warning per distinct cycle.
    pub warnings: Vec<DataWarning>,
}

/// Options for [`PathFinder::reading_path`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingPathOptions {
    /// Hop limit.
    pub max_depth: u32,
    /// Result cap.
    pub max_results: usize,
    /// When set, only these tiers are emitted. Other editions are still
    /// traversed.
    pub importance: Option<Vec<Importance>>,
}

impl Default for ReadingPathOptions {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_results: 50,
            importance: None,
        }
    }
}

/// One entry of a reading path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingStep {
    /// The edition to read.
    pub edition: EditionId,
    /// Edition it was reached from.
    pub via: EditionId,
    /// Type of the connection followed.
    pub connection_type: ConnectionType,
    /// Strength of the connection followed.
    pub strength: f32,
    /// Hops from the start; editions sharing a depth form one phase.
    pub depth: u32,
    /// Ranking score.
    pub score: f64,
}

/// Topological reading order over a set of editions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadingOrder {
    /// All requested editions; those caught in cycles come last.
    pub order: Vec<EditionId>,
    /// Editions that could not be ordered because of a cycle.
    pub unresolved: Vec<EditionId>,
    /// One `CycleDetected` warning per distinct cycle.
    pub warnings: Vec<DataWarning>,
}

/// Reading-path frontier entry: max-heap by score, then shallower, then
/// smaller id.
#[derive(Debug, Clone)]
struct Candidate {
    edition: EditionId,
    via: EditionId,
    connection_type: ConnectionType,
    strength: f32,
    depth: u32,
    score: f64,
}

impl Candidate {
    fn new(edition: EditionId, via: EditionId, connection_type: ConnectionType, strength: f32, depth: u32) -> Self {
        let mut score = STRENGTH_WEIGHT * f64::from(strength) - DEPTH_PENALTY * f64::from(depth);
        if connection_type == ConnectionType::Crossover {
            score -= CROSSOVER_PENALTY;
        }
        Self {
            edition,
            via,
            connection_type,
            strength,
            depth,
            score,
        }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.depth.cmp(&self.depth))
            .then_with(|| other.edition.cmp(&self.edition))
            .then_with(|| other.via.cmp(&self.via))
            .then_with(|| other.connection_type.cmp(&self.connection_type))
    }
}

/// Traversals over one graph.
pub struct PathFinder<'a> {
    graph: &'a EditionGraph,
    cancel: Option<CancellationToken>,
    #[cfg(test)]
    on_layer: Option<Box<dyn Fn(usize) + 'a>>,
}

impl<'a> PathFinder<'a> {
    /// Create a path finder.
    pub fn new(graph: &'a EditionGraph) -> Self {
        Self {
            graph,
            cancel: None,
            #[cfg(test)]
            on_layer: None,
        }
    }

    /// Observe a cancellation token between traversal layers.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Run `hook` with the layer count after each breadth-first layer.
    #[cfg(test)]
    fn with_layer_hook(mut self, hook: impl Fn(usize) + 'a) -> Self {
        self.on_layer = Some(Box::new(hook));
        self
    }

    #[cfg(test)]
    fn layer_done(&self, layers: usize) {
        if let Some(hook) = &self.on_layer {
            hook(layers);
        }
    }

    #[cfg(not(test))]
    fn layer_done(&self, _layers: usize) {}

    fn check_cancelled(&self) -> Result<(), PathError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(PathError::Cancelled),
            _ => Ok(()),
        }
    }

    fn require(&self, id: &EditionId) -> Result<(), PathError> {
        if self.graph.contains(id) {
            Ok(())
        } else {
            Err(PathError::UnknownEdition(id.clone()))
        }
    }

    fn title(&self, id: &EditionId) -> &str {
        self.graph.edition(id).map_or("", |e| e.title.as_str())
    }

    /// Direct leads-to and crossover successors.
    ///
    /// When both types point at the same edition, the stronger connection
    /// represents it. Ranked by strength descending, then title ascending,
    /// then id.
    pub fn whats_next(&self, id: &EditionId) -> Result<Vec<NextRead>, PathError> {
        self.require(id)?;

        let mut best: BTreeMap<&EditionId, (ConnectionType, f32)> = BTreeMap::new();
        for adj in self.graph.successors(id, ConnectionFilter::NEXT_READS) {
            let entry = best.entry(&adj.edition).or_insert((adj.connection_type, adj.strength));
            if adj.strength > entry.1 {
                *entry = (adj.connection_type, adj.strength);
            }
        }

        let mut ranked: Vec<NextRead> = best
            .into_iter()
            .map(|(edition, (connection_type, strength))| NextRead {
                edition: edition.clone(),
                title: self.title(edition).to_string(),
                connection_type,
                strength,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.edition.cmp(&b.edition))
        });
        Ok(ranked)
    }

    /// Unweighted shortest path over all types except optional.
    ///
    /// Neighbors are visited in id order, so among equally short routes
    /// the lexicographically smallest is returned.
    pub fn shortest_path(&self, from: &EditionId, to: &EditionId) -> Result<PathOutcome, PathError> {
        self.require(from)?;
        self.require(to)?;
        if from == to {
            return Ok(PathOutcome::Found {
                path: vec![from.clone()],
                hops: 0,
            });
        }

        let mut parent: HashMap<&EditionId, &EditionId> = HashMap::new();
        let mut visited: HashSet<&EditionId> = HashSet::from([from]);
        let mut layer: Vec<&EditionId> = vec![from];
        let mut layers = 0;

        while !layer.is_empty() {
            self.check_cancelled()?;
            layers += 1;
            let mut next = Vec::new();
            for current in layer {
                for adj in self.graph.successors(current, ConnectionFilter::ROUTABLE) {
                    if !visited.insert(&adj.edition) {
                        continue;
                    }
                    parent.insert(&adj.edition, current);
                    if &adj.edition == to {
                        let path = unwind(&parent, to);
                        let hops = path.len() - 1;
                        debug!(from = %from, to = %to, hops, "shortest path found");
                        return Ok(PathOutcome::Found { path, hops });
                    }
                    next.push(&adj.edition);
                }
            }
            layer = next;
            self.layer_done(layers);
        }

        debug!(from = %from, to = %to, "no path");
        Ok(PathOutcome::NoPath)
    }

    /// All transitive prerequisites of an edition.
    ///
    /// Cycles among the prerequisites never loop the traversal; each is
    /// reported once as `CycleDetected`, starting from its smallest id in
    /// reading direction. Under [`CyclePolicy::Block`] a chain containing
    /// a cycle returns no ancestors.
    pub fn prerequisite_chain(&self, id: &EditionId, policy: CyclePolicy) -> Result<PrerequisiteChain, PathError> {
        self.require(id)?;

        let mut depth: HashMap<&EditionId, u32> = HashMap::from([(id, 0)]);
        let mut layer = vec![id];
        let mut level = 0;
        while !layer.is_empty() {
            self.check_cancelled()?;
            level += 1;
            let mut next = Vec::new();
            for current in layer {
                for adj in self.graph.predecessors(current, ConnectionFilter::PREREQUISITES) {
                    if !depth.contains_key(&adj.edition) {
                        depth.insert(&adj.edition, level);
                        next.push(&adj.edition);
                    }
                }
            }
            layer = next;
            self.layer_done(level as usize);
        }

        let cycles: BTreeSet<Vec<EditionId>> = find_cycles(std::iter::once(id), |node| {
            self.graph
                .predecessors(node, ConnectionFilter::PREREQUISITES)
                .into_iter()
                .map(|adj| adj.edition.clone())
                .collect()
        })
        .into_iter()
        .map(|mut cycle| {
            // Found walking prerequisite edges backwards.
            cycle.reverse();
            rotate_to_min(cycle)
        })
        .collect();

        let warnings: Vec<DataWarning> = cycles
            .into_iter()
            .map(|cycle| {
                warn!(edition = %id, cycle_len = cycle.len(), policy = %policy, "prerequisite cycle detected");
                DataWarning::CycleDetected { cycle }
            })
            .collect();

        if policy == CyclePolicy::Block && !warnings.is_empty() {
            return Ok(PrerequisiteChain {
                ancestors: Vec::new(),
                blocked: true,
                warnings,
            });
        }

        let mut ancestors: Vec<Ancestor> = depth
            .into_iter()
            .filter(|(edition, _)| *edition != id)
            .map(|(edition, depth)| Ancestor {
                edition: edition.clone(),
                depth,
            })
            .collect();
        ancestors.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.edition.cmp(&b.edition)));

        Ok(PrerequisiteChain {
            ancestors,
            blocked: false,
            warnings,
        })
    }

    /// Best-first reading path from a start edition.
    ///
    /// Follows leads-to, crossover and prerequisite connections. Each
    /// candidate scores `100·strength − 20·depth`, minus 80 for a
    /// crossover, so strong same-line continuations come before tie-ins.
    /// Editions outside the importance filter are traversed but not
    /// emitted.
    pub fn reading_path(&self, start: &EditionId, options: &ReadingPathOptions) -> Result<Vec<ReadingStep>, PathError> {
        self.require(start)?;

        let mut results = Vec::new();
        let mut visited: HashSet<EditionId> = HashSet::from([start.clone()]);
        let mut frontier: BinaryHeap<Candidate> = BinaryHeap::new();
        self.push_successors(start, 1, options.max_depth, &visited, &mut frontier);

        while results.len() < options.max_results {
            let Some(candidate) = frontier.pop() else {
                break;
            };
            if !visited.insert(candidate.edition.clone()) {
                continue;
            }
            self.check_cancelled()?;

            self.push_successors(
                &candidate.edition,
                candidate.depth + 1,
                options.max_depth,
                &visited,
                &mut frontier,
            );

            let emitted = match (&options.importance, self.graph.edition(&candidate.edition)) {
                (Some(tiers), Some(edition)) => tiers.is_empty() || tiers.contains(&edition.importance),
                _ => true,
            };
            if emitted {
                results.push(ReadingStep {
                    edition: candidate.edition,
                    via: candidate.via,
                    connection_type: candidate.connection_type,
                    strength: candidate.strength,
                    depth: candidate.depth,
                    score: candidate.score,
                });
            }
        }

        debug!(start = %start, steps = results.len(), "reading path built");
        Ok(results)
    }

    fn push_successors(
        &self,
        from: &EditionId,
        depth: u32,
        max_depth: u32,
        visited: &HashSet<EditionId>,
        frontier: &mut BinaryHeap<Candidate>,
    ) {
        if depth > max_depth {
            return;
        }
        for adj in self.graph.successors(from, ConnectionFilter::ROUTABLE) {
            if !visited.contains(&adj.edition) {
                frontier.push(Candidate::new(
                    adj.edition.clone(),
                    from.clone(),
                    adj.connection_type,
                    adj.strength,
                    depth,
                ));
            }
        }
    }

    /// Topological reading order of a set of editions.
    ///
    /// Uses leads-to and prerequisite connections among the given editions.
    /// Ready editions are taken by importance tier, then title
    /// (case-insensitive), then id. Editions held back by a cycle are
    /// appended in the same order and listed as unresolved.
    pub fn reading_order(&self, ids: &[EditionId]) -> Result<ReadingOrder, PathError> {
        for id in ids {
            self.require(id)?;
        }
        let members: BTreeSet<&EditionId> = ids.iter().collect();

        let key = |id: &EditionId| {
            let edition = self.graph.edition(id);
            (
                edition.map(|e| e.importance).unwrap_or_default(),
                edition.map(|e| e.title.to_lowercase()).unwrap_or_default(),
                id.clone(),
            )
        };
        let edges_within = |id: &EditionId| -> Vec<EditionId> {
            let targets: BTreeSet<&EditionId> = self
                .graph
                .successors(id, ConnectionFilter::ORDERING)
                .into_iter()
                .map(|adj| &adj.edition)
                .filter(|target| members.contains(target))
                .collect();
            targets.into_iter().cloned().collect()
        };

        let mut in_degree: HashMap<&EditionId, usize> = members.iter().map(|id| (*id, 0)).collect();
        for id in &members {
            for target in edges_within(*id) {
                if let Some(d) = in_degree.get_mut(&target) {
                    *d += 1;
                }
            }
        }

        let mut ready: BinaryHeap<Reverse<(Importance, String, EditionId)>> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| Reverse(key(*id)))
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse((_, _, id))) = ready.pop() {
            for target in edges_within(&id) {
                if let Some(d) = in_degree.get_mut(&target) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push(Reverse(key(&target)));
                    }
                }
            }
            order.push(id);
        }

        let placed: HashSet<&EditionId> = order.iter().collect();
        let mut unresolved: Vec<EditionId> = members
            .iter()
            .filter(|id| !placed.contains(*id))
            .map(|id| (*id).clone())
            .collect();
        unresolved.sort_by_key(|id| key(id));

        let mut warnings = Vec::new();
        if !unresolved.is_empty() {
            let stuck: BTreeSet<&EditionId> = unresolved.iter().collect();
            let cycles: BTreeSet<Vec<EditionId>> = find_cycles(unresolved.iter(), |node| {
                edges_within(node).into_iter().filter(|t| stuck.contains(t)).collect()
            })
            .into_iter()
            .map(rotate_to_min)
            .collect();
            for cycle in cycles {
                warn!(cycle_len = cycle.len(), "reading-order cycle detected");
                warnings.push(DataWarning::CycleDetected { cycle });
            }
        }

        order.extend(unresolved.iter().cloned());
        Ok(ReadingOrder {
            order,
            unresolved,
            warnings,
        })
    }
}

fn unwind(parent: &HashMap<&EditionId, &EditionId>, target: &EditionId) -> Vec<EditionId> {
    let mut path = vec![target.clone()];
    let mut current = target;
    while let Some(prev) = parent.get(current) {
        path.push((*prev).clone());
        current = *prev;
    }
    path.reverse();
    path
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

/// Iterative DFS cycle search. Each back edge yields the cycle it closes,
/// in traversal direction.
fn find_cycles<'i, R, F>(roots: R, neighbors: F) -> Vec<Vec<EditionId>>
where
    R: Iterator<Item = &'i EditionId>,
    F: Fn(&EditionId) -> Vec<EditionId>,
{
    let mut marks: HashMap<EditionId, Mark> = HashMap::new();
    let mut cycles = Vec::new();

    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        let mut path: Vec<EditionId> = vec![root.clone()];
        let mut stack: Vec<(Vec<EditionId>, usize)> = vec![(neighbors(root), 0)];
        marks.insert(root.clone(), Mark::OnPath);

        while let Some((next_nodes, cursor)) = stack.last_mut() {
            if let Some(next) = next_nodes.get(*cursor).cloned() {
                *cursor += 1;
                match marks.get(&next) {
                    None => {
                        marks.insert(next.clone(), Mark::OnPath);
                        stack.push((neighbors(&next), 0));
                        path.push(next);
                    }
                    Some(Mark::OnPath) => {
                        if let Some(pos) = path.iter().position(|n| *n == next) {
                            cycles.push(path[pos..].to_vec());
                        }
                    }
                    Some(Mark::Done) => {}
                }
            } else {
                stack.pop();
                if let Some(done) = path.pop() {
                    marks.insert(done, Mark::Done);
                }
            }
        }
    }

    cycles
}

fn rotate_to_min(mut cycle: Vec<EditionId>) -> Vec<EditionId> {
    if let Some(pos) = cycle.iter().enumerate().min_by(|a, b| a.1.cmp(b.1)).map(|(i, _)| i) {
        cycle.rotate_left(pos);
    }
    cycle
}
