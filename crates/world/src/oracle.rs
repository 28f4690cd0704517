//! Terrain oracle boundary.
//!
//! The oracle is a deterministic height sampler bound to a world seed. Chunk
//! builders only ever talk to it through [`TerrainOracle::sample_grid`], which
//! returns a row-major `width * height` grid of heights.

use std::fmt;
use std::sync::{Arc, OnceLock};

use terrastream_core::WorldSeed;
use thiserror::Error;
use tracing::info;

use crate::config::NoiseParams;
use crate::fractal::FractalNoise;

/// Failure reported by the oracle boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// The generator has not been installed yet; the request should be retried later.
    #[error("terrain oracle is not initialized")]
    NotReady,
    /// The underlying sampler failed.
    #[error("terrain sampler failed: {0}")]
    Sampler(String),
}

/// One grid sampling request.
///
/// Row `r`, column `c` samples at `(origin_x + c * step, origin_z + r * step)`.
/// With `rotate` the roles swap, so row `r`, column `c` samples at
/// `(origin_x + r * step, origin_z + c * step)`. Flips mirror the index along
/// the sampled world axis before it is scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRequest {
    pub width: usize,
    pub height: usize,
    pub origin_x: f32,
    pub origin_z: f32,
    pub step: f32,
    pub noise: NoiseParams,
    pub offset: f32,
    pub rotate: bool,
    pub flip_x: bool,
    pub flip_z: bool,
}

impl GridRequest {
    /// Square grid with no reorientation.
    pub fn square(verts: usize, origin: (f32, f32), step: f32, noise: NoiseParams) -> Self {
        Self {
            width: verts,
            height: verts,
            origin_x: origin.0,
            origin_z: origin.1,
            step,
            noise,
            offset: 0.0,
            rotate: false,
            flip_x: false,
            flip_z: false,
        }
    }

    pub fn with_offset(mut self, offset: f32) -> Self {
        self.offset = offset;
        self
    }

    pub fn rotated(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    /// Number of samples the request produces.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sample-space coordinate for the grid cell at (`row`, `col`).
    pub fn sample_coords(&self, row: usize, col: usize) -> (f32, f32) {
        let (ix, iz, extent_x, extent_z) = if self.rotate {
            (row, col, self.height, self.width)
        } else {
            (col, row, self.width, self.height)
        };
        let ix = if self.flip_x { extent_x - ix - 1 } else { ix };
        let iz = if self.flip_z { extent_z - iz - 1 } else { iz };
        (
            self.origin_x + ix as f32 * self.step,
            self.origin_z + iz as f32 * self.step,
        )
    }
}

/// Deterministic height sampler.
///
/// Implementations must return bit-identical output for identical arguments;
/// adjacent chunks rely on it to agree along their shared edge.
pub trait TerrainOracle: Send + Sync {
    /// Height at a single sample-space coordinate.
    fn height_at(&self, x: f32, z: f32, noise: &NoiseParams, offset: f32) -> f32;

    /// Row-major grid of heights described by `request`.
    fn sample_grid(&self, request: &GridRequest) -> Result<Vec<f32>, OracleError> {
        let mut heights = Vec::with_capacity(request.len());
        for row in 0..request.height {
            for col in 0..request.width {
                let (x, z) = request.sample_coords(row, col);
                heights.push(self.height_at(x, z, &request.noise, request.offset));
            }
        }
        Ok(heights)
    }
}

/// Built-in oracle: simplex fBm keyed by the world seed.
pub struct NoiseOracle {
    seed: WorldSeed,
    noise: FractalNoise,
}

impl NoiseOracle {
    pub fn new(seed: WorldSeed) -> Self {
        let noise = FractalNoise::new(seed.derive_u32("terrain.simplex"));
        Self { seed, noise }
    }

    pub fn from_phrase(phrase: &str) -> Self {
        Self::new(WorldSeed::from_phrase(phrase))
    }

    pub fn seed(&self) -> &WorldSeed {
        &self.seed
    }
}

impl fmt::Debug for NoiseOracle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoiseOracle").field("seed", &self.seed).finish()
    }
}

impl TerrainOracle for NoiseOracle {
    fn height_at(&self, x: f32, z: f32, noise: &NoiseParams, offset: f32) -> f32 {
        self.noise.fbm(x, z, noise) + offset
    }
}

/// Shared, initialize-once slot for the oracle.
///
/// Builders scheduled before [`OracleHandle::install`] see
/// [`OracleError::NotReady`] and stay queued.
#[derive(Clone, Default)]
pub struct OracleHandle {
    slot: Arc<OnceLock<Arc<dyn TerrainOracle>>>,
}

impl OracleHandle {
    /// Handle with no generator yet.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Handle that is ready immediately.
    pub fn ready(oracle: Arc<dyn TerrainOracle>) -> Self {
        let handle = Self::pending();
        handle.install(oracle);
        handle
    }

    /// Publish the generator. Returns false if one was already installed.
    pub fn install(&self, oracle: Arc<dyn TerrainOracle>) -> bool {
        let installed = self.slot.set(oracle).is_ok();
        if installed {
            info!("terrain oracle initialized");
        }
        installed
    }

    pub fn is_ready(&self) -> bool {
        self.slot.get().is_some()
    }

    pub fn get(&self) -> Result<&Arc<dyn TerrainOracle>, OracleError> {
        self.slot.get().ok_or(OracleError::NotReady)
    }
}

impl fmt::Debug for OracleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleHandle")
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(rotate: bool) -> GridRequest {
        GridRequest::square(5, (10.0, -4.0), 0.5, NoiseParams::default()).rotated(rotate)
    }

    #[test]
    fn sample_grid_is_deterministic() {
        let a = NoiseOracle::from_phrase("determinism");
        let b = NoiseOracle::from_phrase("determinism");
        let req = request(false);
        let ha = a.sample_grid(&req).unwrap();
        let hb = b.sample_grid(&req).unwrap();
        assert_eq!(ha.len(), 25);
        for (x, y) in ha.iter().zip(&hb) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn row_major_layout_matches_point_queries() {
        let oracle = NoiseOracle::from_phrase("layout");
        let req = request(false);
        let grid = oracle.sample_grid(&req).unwrap();
        // Row 2, column 3 sits at x = origin + 3 * step, z = origin + 2 * step.
        let expected = oracle.height_at(11.5, -3.0, &req.noise, 0.0);
        assert_eq!(grid[2 * 5 + 3], expected);
    }

    #[test]
    fn rotate_transposes_grid() {
        let oracle = NoiseOracle::from_phrase("rotate");
        let plain = oracle.sample_grid(&request(false)).unwrap();
        let rotated = oracle.sample_grid(&request(true)).unwrap();
        for row in 0..5 {
            for col in 0..5 {
                assert_eq!(rotated[row * 5 + col], plain[col * 5 + row]);
            }
        }
    }

    #[test]
    fn flips_mirror_indices() {
        let mut req = request(false);
        req.flip_x = true;
        assert_eq!(req.sample_coords(0, 0), (12.0, -4.0));
        req.flip_z = true;
        assert_eq!(req.sample_coords(0, 4), (10.0, -2.0));
    }

    #[test]
    fn offset_biases_every_sample() {
        let oracle = NoiseOracle::from_phrase("offset");
        let base = oracle.sample_grid(&request(false)).unwrap();
        let biased = oracle
            .sample_grid(&request(false).with_offset(3.0))
            .unwrap();
        for (b, o) in base.iter().zip(&biased) {
            assert!((o - b - 3.0).abs() < 1e-5);
        }
    }

    #[test]
    fn pending_handle_reports_not_ready() {
        let handle = OracleHandle::pending();
        assert!(!handle.is_ready());
        assert!(matches!(handle.get(), Err(OracleError::NotReady)));

        assert!(handle.install(Arc::new(NoiseOracle::from_phrase("late"))));
        assert!(handle.is_ready());
        assert!(!handle.install(Arc::new(NoiseOracle::from_phrase("again"))));
    }

    #[test]
    fn clones_share_the_slot() {
        let handle = OracleHandle::pending();
        let clone = handle.clone();
        handle.install(Arc::new(NoiseOracle::from_phrase("shared")));
        assert!(clone.is_ready());
    }
}
