//! Tangled Program Graph demo CLI.
//!
//! Builds a small graph wired up with [`LinearProgramBackend`]'s toy
//! dot-product bidders, and either runs it through the evolutionary
//! harness for a handful of generations (`run`) or renders its current
//! structure as Graphviz DOT (`dot`).

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use rand::SeedableRng;

use tpg_core::testing::LinearProgramBackend;
use tpg_core::{CacheMode, TangledProgramGraph, TPGMutationConfig};
use tpg_evo::{run as run_harness, HarnessConfig, HarnessError, SumOverInputs};

/// Tangled Program Graph demo and tools.
#[derive(Parser)]
#[command(name = "tpg", about = "Tangled Program Graph demo and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run the evolutionary harness over a freshly seeded demo graph.
    Run {
        /// Number of root teams in the population.
        #[arg(short, long, default_value_t = 8)]
        population: usize,

        /// Number of generations to run.
        #[arg(short, long, default_value_t = 20)]
        generations: usize,

        /// Number of elite roots carried over unmutated each generation.
        #[arg(short, long, default_value_t = 1)]
        elites: usize,

        /// Seed for the demo graph's RNG and the harness's own RNG.
        #[arg(short, long, default_value_t = 1)]
        seed: u64,
    },
    /// Render a freshly seeded demo graph as Graphviz DOT.
    Dot {
        /// Number of root teams to seed.
        #[arg(short, long, default_value_t = 3)]
        population: usize,

        /// Seed for the demo graph's RNG.
        #[arg(short, long, default_value_t = 1)]
        seed: u64,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Run {
            population,
            generations,
            elites,
            seed,
        } => run_demo(population, generations, elites, seed),
        Commands::Dot {
            population,
            seed,
            output,
        } => run_dot(population, seed, output),
    };
    process::exit(exit_code);
}

/// Builds a demo graph: each root team has two linear-bidder programs, one
/// favoring action `'A'` and one favoring `'B'`, both terminating (no
/// action-map entry).
fn seed_demo_graph(
    population: usize,
    rng: &mut impl rand::Rng,
) -> TangledProgramGraph<char, Vec<f64>> {
    let mut graph = TangledProgramGraph::new(vec!['A', 'B']);
    for i in 0..population {
        let bias = i as f64 + 1.0;
        let p_a = graph
            .add_program(LinearProgramBackend::encode(&[bias, 0.0]), Some('A'), rng)
            .expect("demo action 'A' is in the action set");
        let p_b = graph
            .add_program(LinearProgramBackend::encode(&[0.0, bias]), Some('B'), rng)
            .expect("demo action 'B' is in the action set");
        let team = graph
            .add_team(vec![p_a, p_b], None)
            .expect("fresh programs with no duplicates");
        graph.add_root(team).expect("team was just created");
    }
    graph
}

/// Runs the harness for `generations` generations, printing one summary
/// line per generation. Returns the process exit code: 0 on success, 1 on
/// an ordinary harness error, 2 if the graph's integrity broke and
/// survived garbage collection.
fn run_demo(population: usize, generations: usize, elites: usize, seed: u64) -> i32 {
    let mut seed_rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let mut graph = seed_demo_graph(population, &mut seed_rng);
    let backend = LinearProgramBackend;

    let config = HarnessConfig {
        population_size: population,
        generations,
        elite_count: elites,
        cache_mode: CacheMode::Lru { max_size: 256 },
        mutation: TPGMutationConfig::default(),
        warmup_threads: 4,
        ..HarnessConfig::default()
    };

    let inputs = vec![vec![1.0, 1.0], vec![2.0, 0.5], vec![0.5, 2.0]];
    let mut fitness = SumOverInputs {
        inputs: &inputs,
        max_depth: config.max_eval_depth,
        score_action: |action: &char| if *action == 'A' { 1.0 } else { 0.0 },
    };

    let mut harness_rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed.wrapping_add(1));
    let result = run_harness(
        &mut graph,
        &backend,
        &config,
        &mut fitness,
        &inputs,
        &mut harness_rng,
        |report| {
            println!(
                "generation {:>3}: best={:.3} elites={} gc_rounds={}",
                report.generation,
                report.best_score,
                report.elites.len(),
                report.gc_rounds
            );
            true
        },
    );

    match result {
        Ok(_) => 0,
        Err(HarnessError::Fatal { reason }) => {
            eprintln!("fatal: graph inconsistency survived garbage collection: {reason}");
            2
        }
        Err(e) => {
            eprintln!("error: {e}");
            1
        }
    }
}

/// Renders a freshly seeded demo graph as DOT, either to stdout or to a
/// file. Returns 3 on a file-write failure.
fn run_dot(population: usize, seed: u64, output: Option<PathBuf>) -> i32 {
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let graph = seed_demo_graph(population, &mut rng);
    let dot = tpg_core::dot::to_dot(&graph);

    match output {
        Some(path) => match fs::write(&path, dot) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("error: failed to write '{}': {e}", path.display());
                3
            }
        },
        None => {
            println!("{dot}");
            0
        }
    }
}
