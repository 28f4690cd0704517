//! Per-chunk terrain construction.
//!
//! A build samples the fine render grid, then the coarse collision grid, and
//! only then assembles the mesh. Cancellation is checked before any sampling,
//! between the two sampling phases, and before assembly.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::chunk::{CancelToken, ChunkKey};
use crate::config::TerrainConfig;
use crate::heightfield::{CollisionField, HeightGrid, HeightfieldExtent};
use crate::mesh::TerrainMesh;
use crate::oracle::{GridRequest, OracleError, TerrainOracle};

/// Reasons a chunk build produced nothing usable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("oracle returned {actual} samples, expected {expected}")]
    MalformedGrid { expected: usize, actual: usize },
    #[error("oracle returned non-finite height {value} at index {index}")]
    NonFiniteHeight { index: usize, value: f32 },
}

impl GenerationError {
    /// The oracle is still initializing; the work should stay queued.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, GenerationError::Oracle(OracleError::NotReady))
    }
}

/// Render mesh and collision field of one Ready chunk.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    key: ChunkKey,
    mesh: TerrainMesh,
    collision: CollisionField,
    world_offset: [f32; 3],
}

impl ChunkPayload {
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn mesh(&self) -> &TerrainMesh {
        &self.mesh
    }

    pub fn collision(&self) -> &CollisionField {
        &self.collision
    }

    /// World-space placement shared by mesh and collision field.
    pub fn world_offset(&self) -> [f32; 3] {
        self.world_offset
    }
}

/// Result of a build that did not fail.
#[derive(Debug)]
pub enum BuildOutcome {
    Built(ChunkPayload),
    Cancelled,
}

/// Stateless chunk constructor bound to a configuration.
#[derive(Debug, Clone)]
pub struct ChunkBuilder {
    config: TerrainConfig,
}

impl ChunkBuilder {
    pub fn new(config: TerrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Fine grid request: (S+1)^2 samples, render orientation.
    pub fn render_request(&self, key: ChunkKey) -> GridRequest {
        GridRequest::square(
            self.config.render_verts(),
            self.config.sample_origin(key),
            self.config.fine_step(),
            self.config.noise,
        )
        .with_offset(self.config.height_offset)
    }

    /// Coarse grid request: (S/ratio+1)^2 samples, physics orientation.
    pub fn collision_request(&self, key: ChunkKey) -> GridRequest {
        GridRequest::square(
            self.config.collision_verts(),
            self.config.sample_origin(key),
            self.config.collision_step(),
            self.config.noise,
        )
        .with_offset(self.config.height_offset)
        .rotated(true)
    }

    /// Run every stage back to back.
    #[instrument(skip(self, oracle, cancel), fields(chunk = %key))]
    pub fn build(
        &self,
        key: ChunkKey,
        oracle: &dyn TerrainOracle,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, GenerationError> {
        if cancel.is_cancelled() {
            return Ok(BuildOutcome::Cancelled);
        }
        let render = self.sample_render(key, oracle)?;
        self.finish(key, render, oracle, cancel)
    }

    /// First stage: sample the render grid.
    pub fn sample_render(
        &self,
        key: ChunkKey,
        oracle: &dyn TerrainOracle,
    ) -> Result<HeightGrid, GenerationError> {
        let request = self.render_request(key);
        sample(oracle, &request)
    }

    /// Second stage: sample the collision grid and assemble both outputs.
    pub fn finish(
        &self,
        key: ChunkKey,
        render: HeightGrid,
        oracle: &dyn TerrainOracle,
        cancel: &CancelToken,
    ) -> Result<BuildOutcome, GenerationError> {
        if cancel.is_cancelled() {
            debug!(chunk = %key, "build cancelled after render sampling");
            return Ok(BuildOutcome::Cancelled);
        }
        let request = self.collision_request(key);
        let collision = sample(oracle, &request)?;

        if cancel.is_cancelled() {
            debug!(chunk = %key, "build cancelled after collision sampling");
            return Ok(BuildOutcome::Cancelled);
        }

        let mesh = TerrainMesh::from_heights(
            &render,
            self.config.cell_world_size(),
            self.config.render_height_scale,
        );
        let world_offset = self.config.world_offset(key);
        let extent = HeightfieldExtent {
            width: self.config.chunk_world_size,
            height: self.config.vertical_unit,
            depth: self.config.chunk_world_size,
        };
        Ok(BuildOutcome::Built(ChunkPayload {
            key,
            mesh,
            collision: CollisionField::new(collision, extent, world_offset),
            world_offset,
        }))
    }
}

fn sample(oracle: &dyn TerrainOracle, request: &GridRequest) -> Result<HeightGrid, GenerationError> {
    let heights = oracle.sample_grid(request)?;
    HeightGrid::from_samples(request.width, request.height, heights)
}
