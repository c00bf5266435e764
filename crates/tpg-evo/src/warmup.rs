//! Concurrent cache warmup, per `spec.md` §5.
//!
//! Before a generation's sequential evaluation pass, every program in the
//! graph is pre-evaluated against the full input batch across a pool of
//! worker threads. Each thread decodes its own executable per program -
//! the graph's own lazy-decode slot on `Program` is never touched here,
//! since populating it needs `&mut` access this phase doesn't have - and
//! writes bids into a shared [`ConcurrentLruCache`], the one cache mode
//! `spec.md` guarantees is safe for concurrent writers.

use tpg_core::{ConcurrentLruCache, ProgramBackend, ProgramId, TangledProgramGraph};

/// Warms `cache` by evaluating every program in `graph` against every
/// input in `inputs`, split across `thread_count` worker threads. A no-op
/// if the graph has no programs or `inputs` is empty.
pub fn warmup_cache<A, X, B>(
    graph: &TangledProgramGraph<A, X>,
    backend: &B,
    inputs: &[B::Input],
    cache: &ConcurrentLruCache,
    thread_count: usize,
) where
    B: ProgramBackend<Executable = X> + Sync,
    B::Input: Sync,
{
    let program_ids: Vec<ProgramId> = graph.program_ids().collect();
    if program_ids.is_empty() || inputs.is_empty() {
        return;
    }

    let worker_count = thread_count.max(1).min(program_ids.len());
    let chunk_size = program_ids.len().div_ceil(worker_count);

    std::thread::scope(|scope| {
        for chunk in program_ids.chunks(chunk_size.max(1)) {
            scope.spawn(move || {
                for &program_id in chunk {
                    let Some(program) = graph.program(program_id) else {
                        continue;
                    };
                    let mut executable = backend.decode(program.genome());
                    for input in inputs {
                        let key = backend.hash(input);
                        if cache.lookup(program_id, key).is_some() {
                            continue;
                        }
                        backend.reset(&mut executable);
                        let bid = backend.evaluate(&executable, input);
                        cache.record(program_id, key, bid);
                    }
                }
            });
        }
    });
}
