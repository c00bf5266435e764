//! Program and Team entity records.
//!
//! Both entities are stored by the graph in ID-keyed tables (the arena+index
//! pattern from `spec.md` §9 "Design Notes") and reference each other only by
//! [`ProgramId`] / [`TeamId`]. Edge sets (`in_edges`/`out_edges`) are pure ID
//! sets; the only code allowed to write them is
//! [`set_team_action`](crate::graph::TangledProgramGraph::set_team_action).

use indexmap::{IndexMap, IndexSet};

use crate::id::{ProgramId, TeamId};

/// Opaque genome payload. The core treats this as inert bytes; decoding,
/// evaluating, and mutating a genome is delegated to a
/// [`ProgramBackend`](crate::backend::ProgramBackend).
pub type Genome = Vec<u8>;

/// A bidder: a genome, an optional cached decoded executable, an optional
/// assigned action, and the edge sets recording which teams include it and
/// which teams it can jump to.
#[derive(Debug, Clone)]
pub struct Program<A, X> {
    id: ProgramId,
    genome: Genome,
    /// Cached decode of `genome`. Invalidated (set to `None`) whenever
    /// `genome` changes; produced lazily on first evaluation.
    decoded: Option<X>,
    action: Option<A>,
    in_edges: IndexSet<TeamId>,
    out_edges: IndexSet<TeamId>,
}

impl<A, X> Program<A, X> {
    pub(crate) fn new(id: ProgramId, genome: Genome, action: Option<A>) -> Self {
        Program {
            id,
            genome,
            decoded: None,
            action,
            in_edges: IndexSet::new(),
            out_edges: IndexSet::new(),
        }
    }

    /// This program's immutable identity.
    pub fn id(&self) -> ProgramId {
        self.id
    }

    /// The genome payload, opaque to the core.
    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    /// The cached decoded executable, if one has been produced.
    pub fn decoded(&self) -> Option<&X> {
        self.decoded.as_ref()
    }

    /// Stores a freshly decoded executable in the cache slot.
    pub(crate) fn set_decoded(&mut self, decoded: X) {
        self.decoded = Some(decoded);
    }

    /// Mutable access to the cached decoded executable, if present.
    /// Evaluation uses this to reset per-run scratch state in place before
    /// each call into the backend.
    pub(crate) fn decoded_mut(&mut self) -> Option<&mut X> {
        self.decoded.as_mut()
    }

    /// Drops the cached decode, e.g. because the genome just changed.
    pub(crate) fn invalidate_decoded(&mut self) {
        self.decoded = None;
    }

    /// This program's assigned action, if any.
    pub fn action(&self) -> Option<&A> {
        self.action.as_ref()
    }

    /// Reassigns this program's action in place.
    pub fn set_action(&mut self, action: Option<A>) {
        self.action = action;
    }

    /// The teams that include this program (I3).
    pub fn in_edges(&self) -> &IndexSet<TeamId> {
        &self.in_edges
    }

    /// The distinct destination teams reached via this program across all
    /// its owning teams (I4).
    pub fn out_edges(&self) -> &IndexSet<TeamId> {
        &self.out_edges
    }

    pub(crate) fn in_edges_mut(&mut self) -> &mut IndexSet<TeamId> {
        &mut self.in_edges
    }

    pub(crate) fn out_edges_mut(&mut self) -> &mut IndexSet<TeamId> {
        &mut self.out_edges
    }
}

/// A node in the graph: an ordered, duplicate-free set of programs plus an
/// action map giving each program's outgoing edge.
#[derive(Debug, Clone)]
pub struct Team {
    id: TeamId,
    /// Insertion-ordered, duplicate-free membership (I1 constrains
    /// `action_map`'s keys to be a subset of this).
    programs: IndexSet<ProgramId>,
    /// Mapping from a program this team contains to the next team reached
    /// when that program wins the bid. The only writer is
    /// [`set_team_action`](crate::graph::TangledProgramGraph::set_team_action).
    action_map: IndexMap<ProgramId, TeamId>,
    in_edges: IndexSet<TeamId>,
    out_edges: IndexSet<TeamId>,
}

impl Team {
    pub(crate) fn new(id: TeamId, programs: IndexSet<ProgramId>) -> Self {
        Team {
            id,
            programs,
            action_map: IndexMap::new(),
            in_edges: IndexSet::new(),
            out_edges: IndexSet::new(),
        }
    }

    /// This team's immutable identity.
    pub fn id(&self) -> TeamId {
        self.id
    }

    /// The programs this team contains, in insertion order.
    pub fn programs(&self) -> &IndexSet<ProgramId> {
        &self.programs
    }

    /// The program -> destination-team mapping (I1, I2).
    pub fn action_map(&self) -> &IndexMap<ProgramId, TeamId> {
        &self.action_map
    }

    /// Teams with at least one program mapping to this team (I5).
    pub fn in_edges(&self) -> &IndexSet<TeamId> {
        &self.in_edges
    }

    /// Exactly the set of values currently present in `action_map` (I2).
    pub fn out_edges(&self) -> &IndexSet<TeamId> {
        &self.out_edges
    }

    pub(crate) fn programs_mut(&mut self) -> &mut IndexSet<ProgramId> {
        &mut self.programs
    }

    pub(crate) fn action_map_mut(&mut self) -> &mut IndexMap<ProgramId, TeamId> {
        &mut self.action_map
    }

    pub(crate) fn in_edges_mut(&mut self) -> &mut IndexSet<TeamId> {
        &mut self.in_edges
    }

    pub(crate) fn out_edges_mut(&mut self) -> &mut IndexSet<TeamId> {
        &mut self.out_edges
    }
}
