//! Idle animation rotation

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::AmbientConfig;

/// Weighted picker over the quiet, micro and active idle pools
pub struct AmbientRotation {
    pools: [Vec<String>; 3],
    weights: [f32; 3],
    rng: StdRng,
}

impl AmbientRotation {
    /// Rotation seeded from the OS
    #[must_use]
    pub fn new(config: &AmbientConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic rotation for a fixed seed
    #[must_use]
    pub fn seeded(config: &AmbientConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &AmbientConfig, rng: StdRng) -> Self {
        Self {
            pools: [
                config.quiet.clone(),
                config.micro.clone(),
                config.active.clone(),
            ],
            weights: config.weights,
            rng,
        }
    }

    /// Pick the next idle cue, avoiding `previous` whenever another cue exists
    ///
    /// Returns `None` only when every pool is empty.
    pub fn next(&mut self, previous: Option<&str>) -> Option<String> {
        let pool = self.pick_pool()?;
        let fresh: Vec<&String> = self.pools[pool]
            .iter()
            .filter(|cue| Some(cue.as_str()) != previous)
            .collect();
        if let Some(cue) = fresh.choose(&mut self.rng) {
            return Some((*cue).clone());
        }

        // Chosen pool only holds the previous cue
        let others: Vec<&String> = self
            .pools
            .iter()
            .flatten()
            .filter(|cue| Some(cue.as_str()) != previous)
            .collect();
        others
            .choose(&mut self.rng)
            .map(|cue| (*cue).clone())
            .or_else(|| previous.map(ToString::to_string))
    }

    fn pick_pool(&mut self) -> Option<usize> {
        let candidates: Vec<(usize, f32)> = self
            .pools
            .iter()
            .zip(self.weights)
            .enumerate()
            .filter(|(_, (pool, weight))| !pool.is_empty() && *weight > 0.0)
            .map(|(i, (_, weight))| (i, weight))
            .collect();

        let total: f32 = candidates.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return self.pools.iter().position(|pool| !pool.is_empty());
        }

        let mut roll = self.rng.gen_range(0.0..total);
        for (i, weight) in &candidates {
            if roll < *weight {
                return Some(*i);
            }
            roll -= weight;
        }
        candidates.last().map(|(i, _)| *i)
    }
}
