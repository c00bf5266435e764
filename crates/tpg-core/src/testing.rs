//! `LinearProgramBackend`: a deterministic reference [`ProgramBackend`],
//! test-only scaffolding rather than a production bidder substrate (the
//! inner numeric-program representation itself is explicitly out of this
//! crate's scope).
//!
//! A genome is a fixed-size vector of `f64` coefficients, packed as
//! little-endian bytes. `evaluate` is the dot product of the decoded
//! coefficients and the input vector; `mutate` perturbs exactly one
//! coefficient, chosen and sized deterministically from a hash of the
//! genome itself (the trait hands `mutate` no RNG, by design - callers
//! supply randomness only where the core's own operators need it).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::backend::ProgramBackend;
use crate::entity::Genome;

/// Deterministic linear-bidder backend used by `tpg-core`'s own tests and
/// the demonstration CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearProgramBackend;

impl LinearProgramBackend {
    /// Encodes a coefficient vector into genome bytes.
    pub fn encode(coefficients: &[f64]) -> Genome {
        let mut bytes = Vec::with_capacity(coefficients.len() * 8);
        for c in coefficients {
            bytes.extend_from_slice(&c.to_le_bytes());
        }
        bytes
    }
}

impl ProgramBackend for LinearProgramBackend {
    type Executable = Vec<f64>;
    type Input = Vec<f64>;

    fn decode(&self, genome: &Genome) -> Vec<f64> {
        genome
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_le_bytes(buf)
            })
            .collect()
    }

    fn evaluate(&self, executable: &Vec<f64>, input: &Vec<f64>) -> f64 {
        executable
            .iter()
            .zip(input.iter())
            .map(|(c, x)| c * x)
            .sum()
    }

    fn mutate(&self, genome: &Genome) -> Genome {
        let mut coefficients = self.decode(genome);
        if coefficients.is_empty() {
            return genome.clone();
        }
        let mut hasher = DefaultHasher::new();
        genome.hash(&mut hasher);
        let digest = hasher.finish();
        let index = (digest as usize) % coefficients.len();
        let delta = ((digest >> 32) % 2001) as f64 / 1000.0 - 1.0; // in [-1.0, 1.0]
        coefficients[index] += delta;
        Self::encode(&coefficients)
    }

    fn reset(&self, _executable: &mut Vec<f64>) {}

    fn hash(&self, input: &Vec<f64>) -> u64 {
        let mut hasher = DefaultHasher::new();
        for x in input {
            x.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}
