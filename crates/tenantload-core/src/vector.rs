//! Query vector generation.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Value range each vector component is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorRange {
    /// Uniform over `[0, 1)`.
    #[default]
    Unit,
    /// Uniform over `[-1, 1)`.
    Symmetric,
}

/// Process-wide seed source.
///
/// Seeded exactly once. Workers never share a generator: each one calls
/// [`RngSource::fork`] and owns the returned instance.
#[derive(Debug, Clone)]
pub struct RngSource {
    master: Arc<Mutex<StdRng>>,
}

impl RngSource {
    /// Deterministic source, for reproducible runs and tests.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            master: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    /// Source seeded from OS entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self {
            master: Arc::new(Mutex::new(StdRng::from_entropy())),
        }
    }

    /// Uses `seed` when present, OS entropy otherwise.
    #[must_use]
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }

    /// Derives an independent generator for one worker.
    #[must_use]
    pub fn fork(&self) -> StdRng {
        let seed = self.master.lock().gen::<u64>();
        StdRng::seed_from_u64(seed)
    }

    /// Derives an independent vector generator for one worker.
    #[must_use]
    pub fn vector_generator(&self, range: VectorRange) -> VectorGenerator {
        VectorGenerator::new(self.fork(), range)
    }
}

/// Produces pseudo-random query vectors of a fixed range.
#[derive(Debug)]
pub struct VectorGenerator {
    rng: StdRng,
    range: VectorRange,
}

impl VectorGenerator {
    /// Wraps an already-seeded generator.
    #[must_use]
    pub fn new(rng: StdRng, range: VectorRange) -> Self {
        Self { rng, range }
    }

    /// Returns `dimensions` independently drawn components.
    pub fn generate(&mut self, dimensions: usize) -> Vec<f32> {
        match self.range {
            VectorRange::Unit => (0..dimensions).map(|_| self.rng.gen::<f32>()).collect(),
            VectorRange::Symmetric => (0..dimensions)
                .map(|_| self.rng.gen_range(-1.0f32..1.0))
                .collect(),
        }
    }
}
