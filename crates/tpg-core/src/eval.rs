//! Evaluation: program bids, team winner selection, and full graph
//! traversal from a root, per `spec.md` §4.8-§4.9.
//!
//! Three layers, each building on the one below:
//! - [`evaluate_program`] decodes (lazily, cached on the `Program`) and
//!   evaluates a single program against an input, consulting/populating
//!   the bid cache.
//! - [`evaluate_team`] collects every member program's bid and picks a
//!   winner: highest bid, ties and non-numeric (`NaN`) bids broken toward
//!   the lowest `ProgramId`.
//! - [`evaluate_graph`] follows the winning program's action-map entry
//!   from team to team until a winner has no entry (a terminating action)
//!   or a team is revisited, recording the `(team, bid)` path taken along
//!   the way.

use std::collections::HashMap;

use crate::backend::ProgramBackend;
use crate::cache::EvalCache;
use crate::error::TpgError;
use crate::graph::TangledProgramGraph;
use crate::id::{ProgramId, TeamId};

/// Default cap on the number of teams a single [`evaluate_graph`] run may
/// traverse before giving up. Generous enough that only a genuinely
/// malformed graph (or one this crate's own invariants failed to prevent)
/// would hit it.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 10_000;

/// Evaluates one program against `input`: a cache hit returns immediately.
/// Otherwise the genome is decoded (lazily, cached on the program until its
/// genome changes), the backend clears any leftover scratch state on the
/// decoded executable, evaluates it, and the fresh bid is cached.
pub fn evaluate_program<A, X, B>(
    graph: &mut TangledProgramGraph<A, X>,
    cache: &mut EvalCache,
    backend: &B,
    program_id: ProgramId,
    input: &B::Input,
) -> Result<f64, TpgError>
where
    B: ProgramBackend<Executable = X>,
{
    let key = backend.hash(input);
    if let Some(bid) = cache.get(program_id, key) {
        return Ok(bid);
    }

    if graph
        .program(program_id)
        .ok_or(TpgError::ProgramNotFound { id: program_id })?
        .decoded()
        .is_none()
    {
        let genome = graph.program(program_id).expect("checked above").genome().clone();
        let decoded = backend.decode(&genome);
        graph
            .program_mut(program_id)
            .expect("checked above")
            .set_decoded(decoded);
    }

    let program = graph.program_mut(program_id).expect("checked above");
    let executable = program.decoded_mut().expect("just populated");
    backend.reset(executable);
    let bid = backend.evaluate(executable, input);
    cache.insert(program_id, key, bid);
    Ok(bid)
}

/// Collects bids from every program in `team_id` and returns the winner
/// together with its bid: the program with the highest bid, with `NaN`
/// bids excluded from consideration (each one logs a warning) and ties
/// among equal or all-`NaN` bids broken toward the lowest [`ProgramId`].
pub fn evaluate_team<A, X, B>(
    graph: &mut TangledProgramGraph<A, X>,
    cache: &mut EvalCache,
    backend: &B,
    team_id: TeamId,
    input: &B::Input,
) -> Result<(ProgramId, f64), TpgError>
where
    B: ProgramBackend<Executable = X>,
{
    let mut program_ids: Vec<ProgramId> = graph
        .team(team_id)
        .ok_or(TpgError::TeamNotFound { id: team_id })?
        .programs()
        .iter()
        .copied()
        .collect();
    if program_ids.is_empty() {
        return Err(TpgError::EmptyTeam { team: team_id });
    }
    program_ids.sort();

    let mut bids = Vec::with_capacity(program_ids.len());
    for program_id in program_ids {
        let bid = evaluate_program(graph, cache, backend, program_id, input)?;
        bids.push((program_id, bid));
    }

    Ok(choose_winner(&bids))
}

/// Picks the winning `(ProgramId, bid)` pair. `bids` must already be
/// sorted by ascending `ProgramId` so the first-seen maximum is also the
/// lowest-ID one among ties.
fn choose_winner(bids: &[(ProgramId, f64)]) -> (ProgramId, f64) {
    let mut best: Option<(ProgramId, f64)> = None;
    let mut any_numeric = false;
    for &(program_id, bid) in bids {
        if bid.is_nan() {
            tracing::warn!(program = %program_id, "non-numeric bid; excluded from winner selection");
            continue;
        }
        any_numeric = true;
        match best {
            Some((_, best_bid)) if bid <= best_bid => {}
            _ => best = Some((program_id, bid)),
        }
    }
    if !any_numeric {
        tracing::warn!("all bids were non-numeric; falling back to the lowest-ID program");
    }
    best.unwrap_or(bids[0])
}

/// The resolved terminal value of a graph evaluation (P9): the winning
/// program's assigned action if it has one, otherwise its bid.
#[derive(Debug, Clone, PartialEq)]
pub enum Terminal<A> {
    Action(A),
    Bid(f64),
}

impl<A> Terminal<A> {
    /// The action, if this terminal resolved to one rather than a bid.
    pub fn action(&self) -> Option<&A> {
        match self {
            Terminal::Action(action) => Some(action),
            Terminal::Bid(_) => None,
        }
    }
}

/// Outcome of a full [`evaluate_graph`] run: the terminating value and the
/// `(team_id, bid)` pairs visited to reach it, in order.
#[derive(Debug, Clone)]
pub struct GraphEvalResult<A> {
    pub action: Terminal<A>,
    pub path: Vec<(TeamId, f64)>,
}

fn terminal_value<A, X>(graph: &TangledProgramGraph<A, X>, winner: ProgramId, bid: f64) -> Terminal<A>
where
    A: Clone,
{
    match graph.program(winner).and_then(|p| p.action().cloned()) {
        Some(action) => Terminal::Action(action),
        None => Terminal::Bid(bid),
    }
}

/// Evaluates starting from `root`: repeatedly runs [`evaluate_team`] and
/// follows the winner's action-map entry to the next team, until either
/// a winner has no entry (its action_map lookup is `None`) or the same
/// team is revisited. Either way evaluation terminates successfully: the
/// result is the relevant winner's action if it has one, otherwise its
/// bid (P9). A revisit is logged (`tracing::warn!`) but is not an error -
/// cross-team cycles are a permitted graph shape (I6). Stops with
/// [`TpgError::EvaluationDepthExceeded`] past `max_depth` teams.
pub fn evaluate_graph<A, X, B>(
    graph: &mut TangledProgramGraph<A, X>,
    cache: &mut EvalCache,
    backend: &B,
    root: TeamId,
    input: &B::Input,
    max_depth: usize,
) -> Result<GraphEvalResult<A>, TpgError>
where
    A: Clone,
    B: ProgramBackend<Executable = X>,
{
    let mut path = Vec::new();
    let mut visited: HashMap<TeamId, (ProgramId, f64)> = HashMap::new();
    let mut current = root;

    loop {
        if let Some(&(winner, bid)) = visited.get(&current) {
            tracing::warn!(
                team = %current,
                "evaluation re-entered an already-visited team; terminating at its prior winner"
            );
            return Ok(GraphEvalResult {
                action: terminal_value(graph, winner, bid),
                path,
            });
        }
        if path.len() >= max_depth {
            return Err(TpgError::EvaluationDepthExceeded {
                start: root,
                max_depth,
            });
        }

        let (winner, bid) = evaluate_team(graph, cache, backend, current, input)?;
        visited.insert(current, (winner, bid));
        path.push((current, bid));

        let team = graph
            .team(current)
            .ok_or(TpgError::TeamNotFound { id: current })?;
        match team.action_map().get(&winner).copied() {
            Some(next) => current = next,
            None => {
                return Ok(GraphEvalResult {
                    action: terminal_value(graph, winner, bid),
                    path,
                });
            }
        }
    }
}
