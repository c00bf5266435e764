//! Integrity verification and garbage collection, per `spec.md` §4.6.
//!
//! The verifier is a read-only consumer of the public graph API: it never
//! mutates anything, just re-derives what `in_edges`/`out_edges`/
//! `action_map` *should* say and compares. The garbage collector is the one
//! piece of machinery allowed to delete orphaned teams and programs
//! outright, and itself calls the verifier afterward to confirm the sweep
//! actually restored consistency.

use crate::cache::EvalCache;
use crate::error::TpgError;
use crate::graph::TangledProgramGraph;
use crate::id::{ProgramId, TeamId};
use crate::traversal::{reachable_from_roots, DistanceStats};

/// A full consistency and reachability snapshot of a graph.
#[derive(Debug, Clone)]
pub struct IntegrityReport {
    pub total_programs: usize,
    pub total_teams: usize,
    pub reachable_teams: usize,
    /// `reachable_teams / total_teams`, as a percentage. `100.0` for an
    /// empty graph.
    pub coverage_pct: f64,
    pub orphan_teams: Vec<TeamId>,
    pub orphan_programs: Vec<ProgramId>,
    pub path_stats: Option<DistanceStats>,
    /// Every invariant violation found, in no particular order. Empty iff
    /// [`Self::consistent`].
    pub mismatches: Vec<String>,
}

impl IntegrityReport {
    pub fn consistent(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Walks the whole graph and cross-checks every derived edge set against
/// what membership and `action_map` entries imply it should be. Reachable
/// teams are those reachable from a registered root.
pub fn verify_integrity<A, X>(graph: &TangledProgramGraph<A, X>) -> IntegrityReport {
    let reach = reachable_from_roots(graph);
    let mut mismatches = Vec::new();

    let team_ids: Vec<TeamId> = graph.team_ids().collect();
    let mut orphan_teams = Vec::new();
    for &team_id in &team_ids {
        if !reach.contains(team_id) {
            orphan_teams.push(team_id);
        }
        let team = graph.team(team_id).expect("from team_ids");

        let expected_out: std::collections::BTreeSet<TeamId> =
            team.action_map().values().copied().collect();
        let actual_out: std::collections::BTreeSet<TeamId> =
            team.out_edges().iter().copied().collect();
        if expected_out != actual_out {
            mismatches.push(format!(
                "team {team_id}: out_edges {actual_out:?} does not match action_map values {expected_out:?}"
            ));
        }

        for key in team.action_map().keys() {
            if !team.programs().contains(key) {
                mismatches.push(format!(
                    "team {team_id}: action_map key {key} is not a team member"
                ));
            }
        }

        for &dest in team.out_edges() {
            match graph.team(dest) {
                Some(dest_team) if dest_team.in_edges().contains(&team_id) => {}
                Some(_) => mismatches.push(format!(
                    "team {team_id}: destination {dest} does not record {team_id} in its in_edges"
                )),
                None => mismatches.push(format!(
                    "team {team_id}: out_edges references missing team {dest}"
                )),
            }
        }

        for &source in team.in_edges() {
            match graph.team(source) {
                Some(source_team) if source_team.out_edges().contains(&team_id) => {}
                Some(_) => mismatches.push(format!(
                    "team {team_id}: source {source} does not record {team_id} in its out_edges"
                )),
                None => mismatches.push(format!(
                    "team {team_id}: in_edges references missing team {source}"
                )),
            }
        }
    }

    let program_ids: Vec<ProgramId> = graph.program_ids().collect();
    let mut orphan_programs = Vec::new();
    for &program_id in &program_ids {
        let program = graph.program(program_id).expect("from program_ids");
        if program.in_edges().is_empty() {
            orphan_programs.push(program_id);
        }
        for &owner in program.in_edges() {
            match graph.team(owner) {
                Some(team) if team.programs().contains(&program_id) => {}
                Some(_) => mismatches.push(format!(
                    "program {program_id}: owner {owner} does not list it as a member"
                )),
                None => mismatches.push(format!(
                    "program {program_id}: in_edges references missing team {owner}"
                )),
            }
        }

        let expected_out: std::collections::BTreeSet<TeamId> = program
            .in_edges()
            .iter()
            .filter_map(|owner| {
                graph
                    .team(*owner)
                    .and_then(|t| t.action_map().get(&program_id))
                    .copied()
            })
            .collect();
        let actual_out: std::collections::BTreeSet<TeamId> =
            program.out_edges().iter().copied().collect();
        if expected_out != actual_out {
            mismatches.push(format!(
                "program {program_id}: out_edges {actual_out:?} does not match derived destinations {expected_out:?}"
            ));
        }
    }

    IntegrityReport {
        total_programs: program_ids.len(),
        total_teams: team_ids.len(),
        reachable_teams: reach.len(),
        coverage_pct: if team_ids.is_empty() {
            100.0
        } else {
            100.0 * reach.len() as f64 / team_ids.len() as f64
        },
        orphan_teams,
        orphan_programs,
        path_stats: reach.distance_stats(),
        mismatches,
    }
}

/// Outcome of a [`garbage_collect`] run.
#[derive(Debug, Clone, Default)]
pub struct GcReport {
    pub rounds: usize,
    pub removed_teams: Vec<TeamId>,
    pub removed_programs: Vec<ProgramId>,
}

/// Iteratively force-removes orphaned teams and then orphaned programs
/// until a pass removes nothing, purging their cache entries as programs
/// are deleted, then re-verifies. Returns
/// [`TpgError::GraphInconsistent`] if mismatches survive the sweep - per
/// `spec.md` §7 this is terminal for the harness, not a recoverable
/// per-call error.
pub fn garbage_collect<A, X>(
    graph: &mut TangledProgramGraph<A, X>,
    cache: &mut EvalCache,
) -> Result<GcReport, TpgError> {
    let mut report = GcReport::default();

    loop {
        report.rounds += 1;
        let reach = reachable_from_roots(graph);
        let orphan_teams: Vec<TeamId> = graph
            .team_ids()
            .filter(|id| !reach.contains(*id))
            .collect();
        for &team_id in &orphan_teams {
            graph.remove_team(team_id, true)?;
            report.removed_teams.push(team_id);
        }

        let orphan_programs: Vec<ProgramId> = graph
            .program_ids()
            .filter(|id| {
                graph
                    .program(*id)
                    .map(|p| p.in_edges().is_empty())
                    .unwrap_or(false)
            })
            .collect();
        for &program_id in &orphan_programs {
            graph.remove_orphan_program(program_id)?;
            cache.remove_program(program_id);
            report.removed_programs.push(program_id);
        }

        if orphan_teams.is_empty() && orphan_programs.is_empty() {
            break;
        }
    }

    let post = verify_integrity(graph);
    if !post.consistent() {
        return Err(TpgError::GraphInconsistent {
            reason: post.mismatches.join("; "),
        });
    }
    Ok(report)
}
