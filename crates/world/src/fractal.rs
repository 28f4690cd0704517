//! Fractal noise used by the built-in terrain oracle.
//!
//! Provides deterministic fractional Brownian motion over simplex noise.

use noise::{NoiseFn, Simplex};

use crate::config::NoiseParams;

/// Simplex-based fBm sampler bound to a single permutation seed.
pub struct FractalNoise {
    simplex: Simplex,
}

impl FractalNoise {
    /// Create a sampler with the given permutation seed.
    pub fn new(seed: u32) -> Self {
        Self {
            simplex: Simplex::new(seed),
        }
    }

    /// Single simplex octave remapped to [0.0, 1.0].
    fn unit(&self, x: f64, z: f64) -> f64 {
        (self.simplex.get([x, z]) + 1.0) * 0.5
    }

    /// Sum `params.octaves` octaves of unit simplex noise.
    ///
    /// The result is not normalised: with persistence `p < 1` it lies in
    /// `[0, amplitude * (1 - p^octaves) / (1 - p)]`.
    pub fn fbm(&self, x: f32, z: f32, params: &NoiseParams) -> f32 {
        let mut sum = 0.0f32;
        let mut amplitude = params.amplitude;
        let mut frequency = params.frequency;
        for _ in 0..params.octaves {
            sum += amplitude * self.unit((x * frequency) as f64, (z * frequency) as f64) as f32;
            frequency *= params.lacunarity;
            amplitude *= params.persistence;
        }
        sum
    }
}
