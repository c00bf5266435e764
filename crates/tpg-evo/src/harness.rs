//! The generational loop, per `spec.md` §6-§7.
//!
//! Each generation: warm the cache concurrently, evaluate every root team's
//! score, keep the top `elite_count` roots untouched, replace the rest with
//! mutated clones of a randomly chosen survivor, garbage-collect, and hand
//! the caller a summary. A root whose fitness evaluation itself errors
//! (e.g. it hits the evaluator's depth cap) is scored at negative infinity
//! rather than aborting the generation - a cyclic or misbehaving root is an
//! ordinary outcome of evolution, not a reason to halt. A post-GC
//! `TpgError::GraphInconsistent` is a different matter: it's treated as
//! fatal and stops the loop outright, since everything downstream of a
//! broken graph is unreliable.

use rand::Rng;

use tpg_core::{
    evaluate_graph, garbage_collect, mutate_root, CacheMode, ConcurrentLruCache, EvalCache,
    ProgramBackend, TangledProgramGraph, TeamId, Terminal, TpgError,
};

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::warmup::warmup_cache;

/// One generation's outcome.
#[derive(Debug, Clone)]
pub struct GenerationReport {
    /// Generation index, starting at 0.
    pub generation: usize,
    /// `(root, score)` pairs for the population entering this generation,
    /// sorted by descending score.
    pub scores: Vec<(TeamId, f64)>,
    /// Root teams kept unmutated into the next generation.
    pub elites: Vec<TeamId>,
    /// How many GC sweeps it took to reach a fixed point this generation.
    pub gc_rounds: usize,
    /// Best score observed this generation.
    pub best_score: f64,
}

/// Scores a single root team against a batch of inputs. Callers provide
/// this closure rather than the harness owning a fixed fitness contract -
/// graph evaluation semantics (which input(s), how failures are scored)
/// are the caller's domain knowledge, not the harness's.
pub trait FitnessFn<A, X, B: ProgramBackend<Executable = X>> {
    fn score(
        &mut self,
        graph: &mut TangledProgramGraph<A, X>,
        cache: &mut EvalCache,
        backend: &B,
        root: TeamId,
    ) -> Result<f64, TpgError>;
}

impl<A, X, B, F> FitnessFn<A, X, B> for F
where
    B: ProgramBackend<Executable = X>,
    F: FnMut(&mut TangledProgramGraph<A, X>, &mut EvalCache, &B, TeamId) -> Result<f64, TpgError>,
{
    fn score(
        &mut self,
        graph: &mut TangledProgramGraph<A, X>,
        cache: &mut EvalCache,
        backend: &B,
        root: TeamId,
    ) -> Result<f64, TpgError> {
        self(graph, cache, backend, root)
    }
}

/// A fitness function that scores a root by evaluating the graph once per
/// `inputs` entry and summing the numeric result of each terminating
/// action via `score_action`.
pub struct SumOverInputs<'a, A, I> {
    pub inputs: &'a [I],
    pub max_depth: usize,
    pub score_action: fn(&A) -> f64,
}

impl<'a, A, X, I, B> FitnessFn<A, X, B> for SumOverInputs<'a, A, I>
where
    A: Clone,
    B: ProgramBackend<Executable = X, Input = I>,
{
    fn score(
        &mut self,
        graph: &mut TangledProgramGraph<A, X>,
        cache: &mut EvalCache,
        backend: &B,
        root: TeamId,
    ) -> Result<f64, TpgError> {
        let mut total = 0.0;
        for input in self.inputs {
            let result = evaluate_graph(graph, cache, backend, root, input, self.max_depth)?;
            total += match &result.action {
                Terminal::Action(action) => (self.score_action)(action),
                Terminal::Bid(bid) => *bid,
            };
        }
        Ok(total)
    }
}

/// Runs the evolutionary harness's generational loop.
///
/// `graph` must already contain `config.population_size` root teams. Each
/// generation warms the cache concurrently over `warmup_inputs`, scores
/// every root with `fitness`, keeps the top `config.elite_count`, and
/// replaces the rest with `mutate_root` clones of a uniformly chosen
/// survivor (elite or not). `epoch_callback` is invoked after every
/// generation with its [`GenerationReport`]; returning `false` stops the
/// loop early without treating it as an error.
pub fn run<A, X, B, F>(
    graph: &mut TangledProgramGraph<A, X>,
    backend: &B,
    config: &HarnessConfig,
    fitness: &mut F,
    warmup_inputs: &[B::Input],
    rng: &mut impl Rng,
    mut epoch_callback: impl FnMut(&GenerationReport) -> bool,
) -> Result<Vec<GenerationReport>, HarnessError>
where
    A: Clone + PartialEq,
    B: ProgramBackend<Executable = X> + Sync,
    B::Input: Sync,
    F: FitnessFn<A, X, B>,
{
    config.validate()?;

    let mut cache = EvalCache::new(config.cache_mode);
    let mut reports = Vec::with_capacity(config.generations);

    for generation in 0..config.generations {
        if let CacheMode::Lru { max_size } = config.cache_mode {
            let concurrent = ConcurrentLruCache::new(max_size);
            warmup_cache(graph, backend, warmup_inputs, &concurrent, config.warmup_threads);
            cache = concurrent.into_sequential();
        }

        let roots: Vec<TeamId> = graph.root_teams().iter().copied().collect();
        let mut scores = Vec::with_capacity(roots.len());
        for root in roots {
            let score = match fitness.score(graph, &mut cache, backend, root) {
                Ok(score) => score,
                Err(err) => {
                    tracing::warn!(
                        root = %root,
                        error = %err,
                        "fitness evaluation failed for this root; scoring it as unfit"
                    );
                    f64::NEG_INFINITY
                }
            };
            scores.push((root, score));
        }
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let elite_count = config.elite_count.min(scores.len());
        let elites: Vec<TeamId> = scores[..elite_count].iter().map(|&(id, _)| id).collect();
        let best_score = scores.first().map(|&(_, s)| s).unwrap_or(f64::NAN);

        let survivors: Vec<TeamId> = scores.iter().map(|&(id, _)| id).collect();
        let replace_count = scores.len().saturating_sub(elite_count);
        for &(root_id, _) in &scores[elite_count..] {
            graph.remove_root(root_id);
        }
        for _ in 0..replace_count {
            let parent = survivors[rng.gen_range(0..survivors.len())];
            let child = mutate_root(graph, &mut cache, backend, parent, &config.mutation, rng)?;
            graph.add_root(child)?;
        }

        let gc_report = match garbage_collect(graph, &mut cache) {
            Ok(report) => report,
            Err(TpgError::GraphInconsistent { reason }) => {
                return Err(HarnessError::Fatal { reason });
            }
            Err(other) => return Err(HarnessError::Core(other)),
        };

        let report = GenerationReport {
            generation,
            scores,
            elites,
            gc_rounds: gc_report.rounds,
            best_score,
        };
        let keep_going = epoch_callback(&report);
        reports.push(report);
        if !keep_going {
            break;
        }
    }

    Ok(reports)
}
