//! `ProgramBackend`: the external collaborator contract for the numeric
//! program substrate.
//!
//! `spec.md` §1 explicitly keeps the bidder representation itself out of the
//! core's scope. Everything the graph needs to know about how a genome
//! becomes a number is expressed through this trait; `tpg-core` never
//! inspects `Genome`/`Executable` bytes directly.

use crate::entity::Genome;

/// Capability the graph calls through to decode, evaluate, and mutate
/// program genomes, and to hash evaluator inputs for cache keys.
///
/// Implementations own the representation of `Genome`, `Executable`, and
/// `Input`; the core only ever holds opaque instances of these and calls
/// through the trait.
pub trait ProgramBackend {
    /// The decoded, directly executable form of a genome.
    type Executable;
    /// The input type programs are evaluated against.
    type Input;

    /// Decodes a genome into its executable form. Called lazily on first
    /// evaluation of a program and cached on the `Program` until the genome
    /// changes.
    fn decode(&self, genome: &Genome) -> Self::Executable;

    /// Evaluates a decoded executable against an input, producing a numeric
    /// bid.
    fn evaluate(&self, executable: &Self::Executable, input: &Self::Input) -> f64;

    /// Produces a mutated copy of a genome. The core clones the genome via
    /// `deep_copy` first and passes the clone here (copy-on-write).
    fn mutate(&self, genome: &Genome) -> Genome;

    /// Clears any per-evaluation scratch state embedded in an executable.
    /// Called between evaluations so hidden state doesn't leak across inputs
    /// (and, during concurrent warmup, across threads).
    fn reset(&self, executable: &mut Self::Executable);

    /// Deterministically hashes an input to a 64-bit cache key.
    fn hash(&self, input: &Self::Input) -> u64;

    /// Deep-copies a genome. Used by `copy_program` and by the program
    /// mutation operator's copy-on-write step.
    fn deep_copy(&self, genome: &Genome) -> Genome {
        genome.clone()
    }
}
