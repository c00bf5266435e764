//! Breadth-first reachability and shortest-path computation over team
//! `out_edges`, per `spec.md` §4.5.
//!
//! Traversal walks the derived edge sets directly (no petgraph dependency:
//! `Team::out_edges` already is the adjacency list) starting from one or
//! many root teams, recording the shortest distance at which each team is
//! first reached. A team reachable from more than one root, or reachable
//! along more than one path from the same root, keeps its first (shortest)
//! distance; later, longer rediscoveries are dropped rather than
//! overwriting it - this is also what keeps the walk from looping forever
//! on a cyclic graph.

use std::collections::VecDeque;

use indexmap::IndexMap;

use crate::graph::TangledProgramGraph;
use crate::id::TeamId;

/// The result of a reachability walk: every reached team's shortest
/// distance (in edges) from the nearest root it was reached from.
#[derive(Debug, Clone, Default)]
pub struct Reachability {
    distances: IndexMap<TeamId, usize>,
}

impl Reachability {
    /// Whether `team` was reached at all.
    pub fn contains(&self, team: TeamId) -> bool {
        self.distances.contains_key(&team)
    }

    /// The shortest distance at which `team` was reached, if at all.
    pub fn distance(&self, team: TeamId) -> Option<usize> {
        self.distances.get(&team).copied()
    }

    /// All reached teams, in the order they were first visited.
    pub fn teams(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.distances.keys().copied()
    }

    /// Count of reached teams.
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    /// Whether nothing was reached.
    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Summary statistics (min/max/mean/standard deviation) over the
    /// recorded distances, via a plain streaming accumulator. `None` if no
    /// teams were reached.
    pub fn distance_stats(&self) -> Option<DistanceStats> {
        if self.distances.is_empty() {
            return None;
        }
        let mut min = usize::MAX;
        let mut max = 0usize;
        let mut sum = 0f64;
        let mut sum_sq = 0f64;
        let n = self.distances.len() as f64;
        for &d in self.distances.values() {
            min = min.min(d);
            max = max.max(d);
            let d = d as f64;
            sum += d;
            sum_sq += d * d;
        }
        let mean = sum / n;
        let variance = (sum_sq / n) - mean * mean;
        let std_dev = variance.max(0.0).sqrt();
        Some(DistanceStats {
            min,
            max,
            mean,
            std_dev,
        })
    }
}

/// Min/max/mean/standard-deviation summary over a set of path lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub std_dev: f64,
}

/// Breadth-first walk over `out_edges` starting from `roots`. A team's
/// distance is the number of edges from the nearest root in `roots`.
/// Cycles and diamonds are both handled by the "first visit wins" rule: a
/// team already in `distances` is never requeued.
pub fn reachable_from<A, X>(
    graph: &TangledProgramGraph<A, X>,
    roots: impl IntoIterator<Item = TeamId>,
) -> Reachability {
    let mut distances = IndexMap::new();
    let mut queue = VecDeque::new();

    for root in roots {
        if graph.team(root).is_some() && !distances.contains_key(&root) {
            distances.insert(root, 0);
            queue.push_back(root);
        }
    }

    while let Some(current) = queue.pop_front() {
        let current_distance = distances[&current];
        let Some(team) = graph.team(current) else {
            continue;
        };
        for &next in team.out_edges() {
            if !distances.contains_key(&next) {
                distances.insert(next, current_distance + 1);
                queue.push_back(next);
            }
        }
    }

    Reachability { distances }
}

/// Convenience wrapper: reachability from the graph's own registered root
/// teams.
pub fn reachable_from_roots<A, X>(graph: &TangledProgramGraph<A, X>) -> Reachability {
    reachable_from(graph, graph.root_teams().iter().copied())
}
