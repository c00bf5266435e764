//! Harness configuration: a plain struct with a `Default` impl and a
//! `validate()` method, following the teacher's `InterpreterConfig`
//! pattern rather than reaching for an external config-file crate.

use tpg_core::{CacheMode, TPGMutationConfig};

use crate::error::HarnessError;

/// Controls one generational run of the evolutionary harness.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of root teams maintained across generations.
    pub population_size: usize,
    /// Number of generations to run before stopping, absent an early-stop
    /// callback firing first.
    pub generations: usize,
    /// Number of top-scoring roots kept unmutated into the next
    /// generation.
    pub elite_count: usize,
    /// Upper bound on teams traversed by a single `evaluate_graph` call.
    pub max_eval_depth: usize,
    /// Caching strategy used during generational (sequential) evaluation.
    pub cache_mode: CacheMode,
    /// Probabilities governing each generation's mutation pass.
    pub mutation: TPGMutationConfig,
    /// Worker thread count for the concurrent cache-warmup phase. `1`
    /// disables concurrency without disabling warmup itself.
    pub warmup_threads: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            population_size: 50,
            generations: 100,
            elite_count: 5,
            max_eval_depth: tpg_core::eval::DEFAULT_MAX_EVAL_DEPTH,
            cache_mode: CacheMode::default(),
            mutation: TPGMutationConfig::default(),
            warmup_threads: 4,
        }
    }
}

impl HarnessConfig {
    /// Checks the population/generation/elite counts are internally
    /// consistent and delegates to [`TPGMutationConfig::validate`].
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.population_size == 0 {
            return Err(HarnessError::InvalidConfig {
                reason: "population_size must be at least 1".to_string(),
            });
        }
        if self.elite_count > self.population_size {
            return Err(HarnessError::InvalidConfig {
                reason: "elite_count cannot exceed population_size".to_string(),
            });
        }
        if self.max_eval_depth == 0 {
            return Err(HarnessError::InvalidConfig {
                reason: "max_eval_depth must be at least 1".to_string(),
            });
        }
        if self.warmup_threads == 0 {
            return Err(HarnessError::InvalidConfig {
                reason: "warmup_threads must be at least 1".to_string(),
            });
        }
        self.mutation
            .validate()
            .map_err(|e| HarnessError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(HarnessConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_elite_count_above_population() {
        let mut config = HarnessConfig::default();
        config.elite_count = config.population_size + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_population() {
        let mut config = HarnessConfig::default();
        config.population_size = 0;
        assert!(config.validate().is_err());
    }
}
