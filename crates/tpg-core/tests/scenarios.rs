//! End-to-end scenarios against the three reference programs from
//! `spec.md` §8: `A = (x1*x2)/x3`, `B = (x1/x2)*x3`, `C = x1*x2`, evaluated
//! over integer inputs `[x1, x2, x3]`.

use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use tpg_core::backend::ProgramBackend;
use tpg_core::cache::{CacheMode, EvalCache};
use tpg_core::entity::Genome;
use tpg_core::graph::TangledProgramGraph;
use tpg_core::mutate::TPGMutationConfig;
use tpg_core::{
    evaluate_graph, evaluate_team, garbage_collect, mutate_root, verify_integrity, Terminal,
};

/// `A`, `B`, `C` from `spec.md` §8, selected by a one-byte genome tag.
#[derive(Debug, Clone, Copy)]
struct ReferenceBackend;

const TAG_A: u8 = 0;
const TAG_B: u8 = 1;
const TAG_C: u8 = 2;

impl ReferenceBackend {
    fn genome_for(tag: u8) -> Genome {
        vec![tag]
    }
}

impl ProgramBackend for ReferenceBackend {
    type Executable = u8;
    type Input = [f64; 3];

    fn decode(&self, genome: &Genome) -> u8 {
        genome[0]
    }

    fn evaluate(&self, executable: &u8, input: &[f64; 3]) -> f64 {
        let [x1, x2, x3] = *input;
        match *executable {
            TAG_A => (x1 * x2) / x3,
            TAG_B => (x1 / x2) * x3,
            TAG_C => x1 * x2,
            other => panic!("unknown program tag {other}"),
        }
    }

    fn mutate(&self, genome: &Genome) -> Genome {
        genome.clone()
    }

    fn reset(&self, _executable: &mut u8) {}

    fn hash(&self, input: &[f64; 3]) -> u64 {
        let mut bits = 0u64;
        for (i, x) in input.iter().enumerate() {
            bits ^= x.to_bits().rotate_left(16 * i as u32);
        }
        bits
    }
}

type RefGraph = TangledProgramGraph<u32, u8>;

fn new_graph() -> RefGraph {
    TangledProgramGraph::new(vec![1, 2])
}

#[test]
fn scenario_1_single_team_leaf_picks_highest_bidder() {
    let mut graph = new_graph();
    let backend = ReferenceBackend;
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let a = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
        .unwrap();
    let b = graph
        .add_program(ReferenceBackend::genome_for(TAG_B), Some(2), &mut rng)
        .unwrap();
    let team = graph.add_team(vec![a, b], None).unwrap();
    graph.add_root(team).unwrap();

    let mut cache = EvalCache::new(CacheMode::Off);

    let result = evaluate_graph(&mut graph, &mut cache, &backend, team, &[1.0, 2.0, 3.0], 16)
        .unwrap();
    assert_eq!(result.action, Terminal::Action(2));

    let result = evaluate_graph(&mut graph, &mut cache, &backend, team, &[1.0, 2.0, 1.0], 16)
        .unwrap();
    assert_eq!(result.action, Terminal::Action(1));
}

#[test]
fn scenario_2_two_team_chain_follows_winner_to_terminating_action() {
    let mut graph = new_graph();
    let backend = ReferenceBackend;
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    let leaf_a = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
        .unwrap();
    let leaf_b = graph
        .add_program(ReferenceBackend::genome_for(TAG_B), Some(2), &mut rng)
        .unwrap();
    let leaf = graph.add_team(vec![leaf_a, leaf_b], None).unwrap();

    let root_a = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
        .unwrap();
    let root_b = graph
        .add_program(ReferenceBackend::genome_for(TAG_B), Some(2), &mut rng)
        .unwrap();
    let mut action_map = IndexMap::new();
    action_map.insert(root_a, leaf);
    let root = graph
        .add_team(vec![root_a, root_b], Some(action_map))
        .unwrap();
    graph.add_root(root).unwrap();

    let mut cache = EvalCache::new(CacheMode::Off);

    let result = evaluate_graph(&mut graph, &mut cache, &backend, root, &[1.0, 2.0, 1.0], 16)
        .unwrap();
    assert_eq!(result.action, Terminal::Action(1));
    assert_eq!(result.path, vec![(root, 2.0), (leaf, 2.0)]);

    let result = evaluate_graph(&mut graph, &mut cache, &backend, root, &[1.0, 2.0, 3.0], 16)
        .unwrap();
    assert_eq!(result.action, Terminal::Action(2));
    assert_eq!(result.path, vec![(root, 1.5)]);
}

#[test]
fn scenario_3_remove_program_mutation_leaves_parent_untouched() {
    let mut graph = new_graph();
    let backend = ReferenceBackend;
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    let a = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
        .unwrap();
    let b = graph
        .add_program(ReferenceBackend::genome_for(TAG_B), Some(2), &mut rng)
        .unwrap();
    let c = graph
        .add_program(ReferenceBackend::genome_for(TAG_C), Some(1), &mut rng)
        .unwrap();
    let leaf = graph.add_team(vec![a, b], None).unwrap();
    let mut action_map = IndexMap::new();
    action_map.insert(b, leaf);
    let root = graph.add_team(vec![a, b, c], Some(action_map)).unwrap();
    graph.add_root(root).unwrap();

    let parent_members_before: Vec<_> = graph.team(root).unwrap().programs().iter().copied().collect();
    let parent_action_map_before = graph.team(root).unwrap().action_map().clone();

    let config = TPGMutationConfig {
        p_remove_program: 1.0,
        p_add_program: 0.0,
        p_mutate_program: 0.0,
        p_mutate_action: 0.0,
        p_mutate_edge: 0.0,
    };
    let mut cache = EvalCache::new(CacheMode::Off);
    let mut mutation_rng = ChaCha8Rng::seed_from_u64(3);
    let clone = mutate_root(&mut graph, &mut cache, &backend, root, &config, &mut mutation_rng)
        .unwrap();

    assert_eq!(
        graph.team(root).unwrap().programs().iter().copied().collect::<Vec<_>>(),
        parent_members_before
    );
    assert_eq!(graph.team(root).unwrap().action_map(), &parent_action_map_before);

    assert_eq!(graph.team(clone).unwrap().programs().len(), 2);
    let removed = parent_members_before
        .iter()
        .copied()
        .find(|pid| !graph.team(clone).unwrap().programs().contains(pid))
        .expect("remove_programs removed exactly one member");
    assert!(graph.program(removed).unwrap().in_edges().contains(&root));
    assert!(!graph.program(removed).unwrap().in_edges().contains(&clone));

    let report = verify_integrity(&graph);
    assert!(report.consistent(), "{:?}", report.mismatches);
}

#[test]
fn scenario_6_gc_round_trip_removes_orphans_and_verifies_clean() {
    let mut graph = new_graph();
    let backend = ReferenceBackend;
    let mut rng = ChaCha8Rng::seed_from_u64(6);

    let shared = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
        .unwrap();
    let solo_b = graph
        .add_program(ReferenceBackend::genome_for(TAG_B), Some(2), &mut rng)
        .unwrap();
    let solo_c = graph
        .add_program(ReferenceBackend::genome_for(TAG_C), Some(1), &mut rng)
        .unwrap();
    let solo_d = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(2), &mut rng)
        .unwrap();

    let leaf1 = graph.add_team(vec![shared, solo_b], None).unwrap();
    let leaf2 = graph.add_team(vec![shared, solo_c], None).unwrap();

    let mut map1 = IndexMap::new();
    map1.insert(solo_b, leaf1);
    let root1 = graph.add_team(vec![solo_b], Some(map1)).unwrap();
    graph.add_root(root1).unwrap();

    let mut map2 = IndexMap::new();
    map2.insert(solo_d, leaf2);
    let root2 = graph.add_team(vec![solo_d], Some(map2)).unwrap();
    graph.add_root(root2).unwrap();

    graph.remove_root(root2);

    let report_before = verify_integrity(&graph);
    assert!(!report_before.orphan_teams.is_empty());

    let mut cache = EvalCache::new(CacheMode::Off);
    let gc_report = garbage_collect(&mut graph, &mut cache).unwrap();
    assert!(gc_report.removed_teams.contains(&root2));
    assert!(gc_report.removed_teams.contains(&leaf2));

    let report_after = verify_integrity(&graph);
    assert!(report_after.consistent(), "{:?}", report_after.mismatches);
    assert!(report_after.orphan_teams.is_empty());
    assert!(report_after.orphan_programs.is_empty());

    assert!(graph.team(root1).is_some());
    assert!(graph.team(leaf1).is_some());
    assert!(graph.team(root2).is_none());
    assert!(graph.team(leaf2).is_none());
}

#[test]
fn scenario_10_loop_via_action_map_terminates_successfully() {
    let mut graph = new_graph();
    let backend = ReferenceBackend;
    let mut rng = ChaCha8Rng::seed_from_u64(10);

    let a1 = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
        .unwrap();
    let a2 = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
        .unwrap();

    let t1 = graph.add_team(vec![a1], None).unwrap();
    let t2 = graph.add_team(vec![a2], None).unwrap();
    graph.set_team_action(t1, a1, Some(t2)).unwrap();
    graph.set_team_action(t2, a2, Some(t1)).unwrap();
    graph.add_root(t1).unwrap();

    let mut cache = EvalCache::new(CacheMode::Off);
    let result = evaluate_graph(&mut graph, &mut cache, &backend, t1, &[1.0, 1.0, 1.0], 16)
        .unwrap();
    // re-entering t1 terminates at its already-recorded winner (a1) rather
    // than erroring - cross-team cycles are a permitted graph shape.
    assert_eq!(result.action, Terminal::Action(1));
    assert_eq!(result.path, vec![(t1, 1.0), (t2, 1.0)]);
}

#[test]
fn scenario_4_action_map_mutation_exercises_all_three_sub_operators() {
    let backend = ReferenceBackend;

    let mut saw_add = false;
    for seed in 0..100u64 {
        let mut graph = new_graph();
        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x9001);
        let a = graph
            .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
            .unwrap();
        let root = graph.add_team(vec![a], None).unwrap();
        let target = graph.add_team(vec![], None).unwrap();
        let config = TPGMutationConfig {
            p_remove_program: 0.0,
            p_add_program: 0.0,
            p_mutate_program: 0.0,
            p_mutate_action: 0.0,
            p_mutate_edge: 1.0,
        };
        let mut mrng = ChaCha8Rng::seed_from_u64(seed);
        let mut cache = EvalCache::new(CacheMode::Off);
        let clone = mutate_root(&mut graph, &mut cache, &backend, root, &config, &mut mrng)
            .unwrap();
        let clone_team = graph.team(clone).unwrap();
        if clone_team.action_map().get(&a) == Some(&target) {
            saw_add = true;
            break;
        }
    }
    assert!(saw_add, "expected some seed to exercise the action-map add sub-operator");

    let mut saw_remove = false;
    let mut saw_change = false;
    for seed in 0..100u64 {
        let mut graph = new_graph();
        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ 0x9002);
        let a = graph
            .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
            .unwrap();
        let root = graph.add_team(vec![a], None).unwrap();
        let original_dest = graph.add_team(vec![], None).unwrap();
        let _alternate_dest = graph.add_team(vec![], None).unwrap();
        graph.set_team_action(root, a, Some(original_dest)).unwrap();
        let config = TPGMutationConfig {
            p_remove_program: 0.0,
            p_add_program: 0.0,
            p_mutate_program: 0.0,
            p_mutate_action: 0.0,
            p_mutate_edge: 1.0,
        };
        let mut mrng = ChaCha8Rng::seed_from_u64(seed);
        let mut cache = EvalCache::new(CacheMode::Off);
        let clone = mutate_root(&mut graph, &mut cache, &backend, root, &config, &mut mrng)
            .unwrap();
        let clone_team = graph.team(clone).unwrap();
        match clone_team.action_map().get(&a) {
            None => saw_remove = true,
            Some(&dest) if dest != original_dest => saw_change = true,
            _ => {}
        }
    }
    assert!(saw_remove, "expected some seed to exercise the action-map remove sub-operator");
    assert!(saw_change, "expected some seed to exercise the action-map change sub-operator");
}

#[test]
fn evaluate_team_is_cached_and_deterministic_across_repeated_calls() {
    let mut graph = new_graph();
    let backend = ReferenceBackend;
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    let a = graph
        .add_program(ReferenceBackend::genome_for(TAG_A), Some(1), &mut rng)
        .unwrap();
    let b = graph
        .add_program(ReferenceBackend::genome_for(TAG_B), Some(2), &mut rng)
        .unwrap();
    let team = graph.add_team(vec![a, b], None).unwrap();

    let mut cache = EvalCache::new(CacheMode::Lru { max_size: 10 });
    let input = [1.0, 2.0, 3.0];
    let first = evaluate_team(&mut graph, &mut cache, &backend, team, &input).unwrap();
    let second = evaluate_team(&mut graph, &mut cache, &backend, team, &input).unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.lru_stats(a), Some((1, 1)));
}
