//! Property-based stress tests for `spec.md` §8 P1-P7: structural
//! invariants that must hold after any sequence of mutation operators,
//! and that copying a team without touching the copy is a no-op on the
//! parent.

use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tpg_core::backend::ProgramBackend;
use tpg_core::cache::{CacheMode, EvalCache};
use tpg_core::entity::Genome;
use tpg_core::graph::TangledProgramGraph;
use tpg_core::mutate::TPGMutationConfig;
use tpg_core::{mutate_root, verify_integrity};

#[derive(Debug, Clone, Copy, Default)]
struct TrivialBackend;

impl ProgramBackend for TrivialBackend {
    type Executable = ();
    type Input = ();

    fn decode(&self, _genome: &Genome) -> Self::Executable {}
    fn evaluate(&self, _executable: &Self::Executable, _input: &Self::Input) -> f64 {
        0.0
    }
    fn mutate(&self, genome: &Genome) -> Genome {
        let mut out = genome.clone();
        out.push(0);
        out
    }
    fn reset(&self, _executable: &mut Self::Executable) {}
    fn hash(&self, _input: &Self::Input) -> u64 {
        0
    }
}

type G = TangledProgramGraph<u8, ()>;

/// Builds a small graph: a root team of `program_count` programs linked to
/// one leaf team holding the same programs, action-mapped from the first
/// half of the root's members.
fn seed_graph(program_count: usize) -> (G, tpg_core::TeamId) {
    let mut graph: G = TangledProgramGraph::new(vec![1, 2, 3]);
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let mut programs = Vec::new();
    for _ in 0..program_count {
        let pid = graph.add_program(vec![1], None, &mut rng).unwrap();
        programs.push(pid);
    }
    let leaf = graph.add_team(programs.clone(), None).unwrap();
    let mut action_map = indexmap::IndexMap::new();
    for &pid in programs.iter().take(program_count / 2) {
        action_map.insert(pid, leaf);
    }
    let root = graph.add_team(programs, Some(action_map)).unwrap();
    graph.add_root(root).unwrap();
    (graph, root)
}

fn arb_mutation_config() -> impl Strategy<Value = TPGMutationConfig> {
    (0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0, 0.0f64..1.0).prop_map(
        |(p_remove, p_add, p_mutate_program, p_mutate_action, p_mutate_edge)| TPGMutationConfig {
            p_remove_program: p_remove,
            p_add_program: p_add,
            p_mutate_program,
            p_mutate_action,
            p_mutate_edge,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// P1-P5: after any sequence of root-clone mutations, every team's
    /// edge sets still agree with its action map and with every other
    /// team/program's reciprocal edge set.
    #[test]
    fn mutation_sequences_preserve_structural_invariants(
        config in arb_mutation_config(),
        seed in any::<u64>(),
        steps in 1usize..6,
    ) {
        let (mut graph, root) = seed_graph(6);
        let backend = TrivialBackend;
        let mut cache = EvalCache::new(CacheMode::Off);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut current = root;
        for _ in 0..steps {
            match mutate_root(&mut graph, &mut cache, &backend, current, &config, &mut rng) {
                Ok(clone) => {
                    graph.add_root(clone).unwrap();
                    current = clone;
                }
                Err(_) => break,
            }
        }

        let report = verify_integrity(&graph);
        prop_assert!(report.consistent(), "mismatches: {:?}", report.mismatches);
    }

    /// P7: copying a team and doing nothing else leaves the parent's own
    /// edges exactly as they were.
    #[test]
    fn copy_team_alone_is_a_no_op_on_the_parent(seed in any::<u64>()) {
        let (mut graph, root) = seed_graph(4);
        let before_members: Vec<_> = graph.team(root).unwrap().programs().iter().copied().collect();
        let before_action_map = graph.team(root).unwrap().action_map().clone();
        let before_out_edges: Vec<_> = graph.team(root).unwrap().out_edges().iter().copied().collect();

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let _ = rng.gen::<u64>();
        let _clone = graph.copy_team(root).unwrap();

        prop_assert_eq!(
            graph.team(root).unwrap().programs().iter().copied().collect::<Vec<_>>(),
            before_members
        );
        prop_assert_eq!(graph.team(root).unwrap().action_map().clone(), before_action_map);
        prop_assert_eq!(
            graph.team(root).unwrap().out_edges().iter().copied().collect::<Vec<_>>(),
            before_out_edges
        );
    }
}
