//! Core error types for tpg-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering all
//! anticipated failure modes of the graph data model. Per the input
//! validation policy, every variant here is a programmer error at the call
//! site: a non-existent ID, a duplicate, or a config value out of range.

use thiserror::Error;

use crate::id::{ProgramId, TeamId};

/// Core errors produced by the tpg-core crate.
#[derive(Debug, Error)]
pub enum TpgError {
    /// A `ProgramId` was not found in the graph.
    #[error("program not found: {id}")]
    ProgramNotFound { id: ProgramId },

    /// A `TeamId` was not found in the graph.
    #[error("team not found: {id}")]
    TeamNotFound { id: TeamId },

    /// Attempted to map or remove a program that is not a member of the team.
    #[error("program {program} is not a member of team {team}")]
    ProgramNotInTeam { team: TeamId, program: ProgramId },

    /// `add_team` was given a program ID more than once.
    #[error("duplicate program {program} in program list for new team")]
    DuplicateProgramInTeam { program: ProgramId },

    /// `set_team_action` was asked to map a team to itself.
    #[error("team {team} cannot map an action to itself")]
    SelfLoopRejected { team: TeamId },

    /// `remove_team` was called without `force=true` on a team with incoming edges.
    #[error("team {team} still has {incoming} incoming edge(s); pass force=true to remove anyway")]
    TeamHasIncomingEdges { team: TeamId, incoming: usize },

    /// An action was supplied to `add_program` that is not in the graph's action set.
    #[error("action is not a member of the graph's action set")]
    ActionNotInSet,

    /// A root target named at evaluation start does not exist in the graph.
    #[error("root team not found: {id}")]
    RootNotFound { id: TeamId },

    /// A mutation-config probability was outside `[0, 1]`, or a required
    /// positive bound (e.g. `max_size`) was zero.
    #[error("invalid mutation configuration: {reason}")]
    InvalidMutationConfig { reason: String },

    /// A team with no member programs was asked to bid.
    #[error("team {team} has no programs to evaluate")]
    EmptyTeam { team: TeamId },

    /// Graph evaluation followed action-map edges through more distinct
    /// teams than `max_depth` allows without reaching a terminating action.
    #[error("evaluation exceeded max depth ({max_depth}) starting from team {start}")]
    EvaluationDepthExceeded { start: TeamId, max_depth: usize },

    /// Graph evaluation revisited a team it had already traversed in the
    /// same run. Cross-team cycles are a permitted graph shape (I6);
    /// `evaluate_graph` no longer returns this as an error - it logs a
    /// warning and terminates successfully at the revisited team's prior
    /// winner. Kept as a variant for callers that want to match on it.
    #[error("evaluation looped back to team {team} already visited in this run")]
    EvaluationLoopDetected { team: TeamId },

    /// The verifier found edge-set mismatches that survived a cleanup pass.
    /// Per `spec.md` §7 this is terminal for the harness, not a programmer
    /// error at a single call site, but it still surfaces through this enum
    /// so callers have one error type to match on.
    #[error("graph inconsistency survived cleanup: {reason}")]
    GraphInconsistent { reason: String },
}
