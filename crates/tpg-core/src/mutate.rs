//! Structural mutation: the root-clone strategy of `spec.md` §4.7.
//!
//! A mutation run never touches the parent root in place - it clones the
//! root team first ([`TangledProgramGraph::copy_team`]) and performs every
//! subsequent edit against the clone, so the parent keeps its identity
//! (and any elite status the harness has given it) across a generation.
//! The five probabilities in [`TPGMutationConfig`] each gate one
//! sub-operator, applied in this order: remove a member program, add a
//! member program, mutate member genomes, mutate member actions, mutate an
//! action-map edge.

use rand::Rng;

use crate::backend::ProgramBackend;
use crate::cache::EvalCache;
use crate::entity::Genome;
use crate::error::TpgError;
use crate::graph::TangledProgramGraph;
use crate::id::{ProgramId, TeamId};

/// Probabilities governing one `mutate_root` run.
///
/// `p_remove_program`, `p_add_program`, and `p_mutate_edge` are each rolled
/// once for the whole cloned team, and on success apply to exactly one
/// uniformly-chosen program (or, for `p_mutate_edge`, one of three
/// sub-operators). `p_mutate_program` and `p_mutate_action` are rolled
/// independently per remaining member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TPGMutationConfig {
    /// Probability of removing one uniformly-random member program, so
    /// long as the team has more than one member.
    pub p_remove_program: f64,
    /// Probability of adding one uniformly-random program already present
    /// elsewhere in the graph (but not already a member) to the team.
    pub p_add_program: f64,
    /// Probability of replacing each remaining member's genome with a
    /// mutated copy (a fresh `ProgramId`; the cache is not inherited since
    /// the bid function changed).
    pub p_mutate_program: f64,
    /// Probability of replacing each remaining member's assigned action
    /// (a fresh `ProgramId` holding the same genome; the cache *is*
    /// inherited since the bid function is unchanged).
    pub p_mutate_action: f64,
    /// Probability of applying one of the three action-map sub-operators
    /// (add/change/remove, chosen uniformly) once to the whole team.
    pub p_mutate_edge: f64,
}

impl Default for TPGMutationConfig {
    fn default() -> Self {
        TPGMutationConfig {
            p_remove_program: 0.2,
            p_add_program: 0.2,
            p_mutate_program: 0.2,
            p_mutate_action: 0.1,
            p_mutate_edge: 0.1,
        }
    }
}

impl TPGMutationConfig {
    /// Checks every probability lies within `[0, 1]`.
    pub fn validate(&self) -> Result<(), TpgError> {
        for (name, value) in [
            ("p_remove_program", self.p_remove_program),
            ("p_add_program", self.p_add_program),
            ("p_mutate_program", self.p_mutate_program),
            ("p_mutate_action", self.p_mutate_action),
            ("p_mutate_edge", self.p_mutate_edge),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TpgError::InvalidMutationConfig {
                    reason: format!("{name} must be within [0, 1], got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Runs the root-clone mutation strategy against `root`, returning the
/// new clone's `TeamId`. The parent team is never modified.
pub fn mutate_root<A, X, B>(
    graph: &mut TangledProgramGraph<A, X>,
    cache: &mut EvalCache,
    backend: &B,
    root: TeamId,
    config: &TPGMutationConfig,
    rng: &mut impl Rng,
) -> Result<TeamId, TpgError>
where
    A: Clone + PartialEq,
    B: ProgramBackend<Executable = X>,
{
    config.validate()?;
    let clone = graph.copy_team(root)?;

    remove_programs(graph, clone, config, rng)?;
    add_programs(graph, clone, backend, config, rng)?;
    mutate_program_genomes(graph, cache, backend, clone, config, rng)?;
    mutate_program_actions(graph, cache, clone, config, rng)?;
    mutate_action_edges(graph, clone, config, rng)?;

    Ok(clone)
}

fn team_members<A, X>(graph: &TangledProgramGraph<A, X>, team_id: TeamId) -> Vec<ProgramId> {
    graph
        .team(team_id)
        .map(|t| t.programs().iter().copied().collect())
        .unwrap_or_default()
}

/// Picks a uniformly-random element of `items`, or `None` if it's empty.
fn pick<T: Copy>(rng: &mut impl Rng, items: &[T]) -> Option<T> {
    if items.is_empty() {
        None
    } else {
        Some(items[rng.gen_range(0..items.len())])
    }
}

/// One Bernoulli roll for the whole team; on success, removes exactly one
/// uniformly-random member, so long as doing so would not empty the team.
fn remove_programs<A, X>(
    graph: &mut TangledProgramGraph<A, X>,
    team_id: TeamId,
    config: &TPGMutationConfig,
    rng: &mut impl Rng,
) -> Result<(), TpgError> {
    if rng.gen::<f64>() >= config.p_remove_program {
        return Ok(());
    }
    let members = team_members(graph, team_id);
    if members.len() <= 1 {
        return Ok(());
    }
    if let Some(victim) = pick(rng, &members) {
        graph.remove_program_from_team(team_id, victim)?;
    }
    Ok(())
}

/// One Bernoulli roll for the whole team; on success, adds exactly one
/// uniformly-random program already present elsewhere in the graph (but
/// not already a member of this team) as a copy.
fn add_programs<A, X, B>(
    graph: &mut TangledProgramGraph<A, X>,
    team_id: TeamId,
    backend: &B,
    config: &TPGMutationConfig,
    rng: &mut impl Rng,
) -> Result<(), TpgError>
where
    A: Clone,
    B: ProgramBackend<Executable = X>,
{
    if rng.gen::<f64>() >= config.p_add_program {
        return Ok(());
    }
    let members: Vec<ProgramId> = team_members(graph, team_id);
    let candidates: Vec<ProgramId> = graph
        .program_ids()
        .filter(|pid| !members.contains(pid))
        .collect();
    let Some(source) = pick(rng, &candidates) else {
        return Ok(());
    };
    let new_id = graph.copy_program(source, backend)?;
    graph.add_program_to_team(team_id, new_id)?;
    Ok(())
}

/// Replaces `old` in `team_id` with a fresh program carrying `new_genome`
/// and `new_action`, preserving `old`'s action-map entry (if any) under the
/// new ID.
fn replace_program_in_team<A, X>(
    graph: &mut TangledProgramGraph<A, X>,
    team_id: TeamId,
    old: ProgramId,
    new_genome: Genome,
    new_action: Option<A>,
    rng: &mut impl Rng,
) -> Result<ProgramId, TpgError>
where
    A: Clone + PartialEq,
{
    let existing_dest = graph
        .team(team_id)
        .and_then(|t| t.action_map().get(&old).copied());
    let new_id = graph.add_program(new_genome, new_action, rng)?;
    graph.remove_program_from_team(team_id, old)?;
    graph.add_program_to_team(team_id, new_id)?;
    if let Some(dest) = existing_dest {
        graph.set_team_action(team_id, new_id, Some(dest))?;
    }
    Ok(new_id)
}

fn mutate_program_genomes<A, X, B>(
    graph: &mut TangledProgramGraph<A, X>,
    _cache: &mut EvalCache,
    backend: &B,
    team_id: TeamId,
    config: &TPGMutationConfig,
    rng: &mut impl Rng,
) -> Result<(), TpgError>
where
    A: Clone + PartialEq,
    B: ProgramBackend<Executable = X>,
{
    for pid in team_members(graph, team_id) {
        if rng.gen::<f64>() >= config.p_mutate_program {
            continue;
        }
        let Some(program) = graph.program(pid) else {
            continue;
        };
        let mutated_genome = backend.mutate(program.genome());
        let action = program.action().cloned();
        // The bid function changed, so deliberately do not call
        // `cache.copy_cache` here: the new program starts with no entries.
        replace_program_in_team(graph, team_id, pid, mutated_genome, action, rng)?;
    }
    Ok(())
}

fn mutate_program_actions<A, X>(
    graph: &mut TangledProgramGraph<A, X>,
    cache: &mut EvalCache,
    team_id: TeamId,
    config: &TPGMutationConfig,
    rng: &mut impl Rng,
) -> Result<(), TpgError>
where
    A: Clone + PartialEq,
{
    for pid in team_members(graph, team_id) {
        if rng.gen::<f64>() >= config.p_mutate_action {
            continue;
        }
        let actions = graph.actions().to_vec();
        if actions.is_empty() {
            continue;
        }
        let Some(program) = graph.program(pid) else {
            continue;
        };
        let genome = program.genome().clone();
        let candidates: Vec<A> = actions
            .iter()
            .filter(|a| Some(*a) != program.action())
            .cloned()
            .collect();
        let new_action = if candidates.is_empty() {
            actions[rng.gen_range(0..actions.len())].clone()
        } else {
            candidates[rng.gen_range(0..candidates.len())].clone()
        };
        // The genome (and so the bid function) is unchanged: the new
        // program's cache is inherited wholesale from the old one.
        let new_id = replace_program_in_team(graph, team_id, pid, genome, Some(new_action), rng)?;
        cache.copy_cache(pid, new_id);
    }
    Ok(())
}

/// One Bernoulli roll for the whole team; on success, applies exactly one
/// of three sub-operators, chosen uniformly: add a mapping to an unmapped
/// member, change an existing mapping's destination, or remove an
/// existing mapping. Each sub-operator no-ops if it has no eligible
/// member/destination to act on.
fn mutate_action_edges<A, X>(
    graph: &mut TangledProgramGraph<A, X>,
    team_id: TeamId,
    config: &TPGMutationConfig,
    rng: &mut impl Rng,
) -> Result<(), TpgError> {
    if rng.gen::<f64>() >= config.p_mutate_edge {
        return Ok(());
    }
    let members = team_members(graph, team_id);
    let Some(team) = graph.team(team_id) else {
        return Ok(());
    };
    let unmapped: Vec<ProgramId> = members
        .iter()
        .copied()
        .filter(|pid| !team.action_map().contains_key(pid))
        .collect();
    let mapped: Vec<ProgramId> = members
        .iter()
        .copied()
        .filter(|pid| team.action_map().contains_key(pid))
        .collect();
    let other_teams: Vec<TeamId> = graph.team_ids().filter(|&t| t != team_id).collect();

    match rng.gen_range(0..3u8) {
        0 => {
            // add
            if let (Some(pid), Some(dest)) = (pick(rng, &unmapped), pick(rng, &other_teams)) {
                graph.set_team_action(team_id, pid, Some(dest))?;
            }
        }
        1 => {
            // change
            if let Some(pid) = pick(rng, &mapped) {
                let current_dest = graph
                    .team(team_id)
                    .and_then(|t| t.action_map().get(&pid).copied());
                let alternatives: Vec<TeamId> = other_teams
                    .iter()
                    .copied()
                    .filter(|&t| Some(t) != current_dest)
                    .collect();
                if let Some(dest) = pick(rng, &alternatives) {
                    graph.set_team_action(team_id, pid, Some(dest))?;
                }
            }
        }
        _ => {
            // remove
            if let Some(pid) = pick(rng, &mapped) {
                graph.set_team_action(team_id, pid, None)?;
            }
        }
    }
    Ok(())
}
