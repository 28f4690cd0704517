//! Terrain streaming configuration.
//!
//! All values are fixed at startup. Derived quantities (sample steps, collision
//! grid size, placement offsets) are computed here so every consumer agrees.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunk::ChunkKey;

/// Largest accepted window radius. A 129×129 window is far beyond any budget.
pub const MAX_RENDER_DISTANCE: i32 = 64;

/// Fractal noise parameters forwarded to the oracle with every sample request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// Number of octaves (layers of detail)
    pub octaves: u32,
    /// Base frequency (scale)
    pub frequency: f32,
    /// Frequency multiplier between octaves
    pub lacunarity: f32,
    /// Amplitude of the first octave
    pub amplitude: f32,
    /// Amplitude multiplier between octaves
    pub persistence: f32,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            octaves: 8,
            frequency: 0.01,
            lacunarity: 2.0,
            amplitude: 1.0,
            persistence: 0.5,
        }
    }
}

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("chunk_world_size must be finite and positive, got {0}")]
    ChunkSize(f32),
    #[error("subdivisions must be at least 1")]
    Subdivisions,
    #[error("collision_ratio {ratio} must be non-zero and divide subdivisions {subdivisions}")]
    CollisionRatio { ratio: u32, subdivisions: u32 },
    #[error("sample_scale must be finite and positive, got {0}")]
    SampleScale(f32),
    #[error("noise parameter `{0}` must be finite")]
    Noise(&'static str),
    #[error("render_distance must be in 0..={max}, got {0}", max = MAX_RENDER_DISTANCE)]
    RenderDistance(i32),
    #[error("builds_per_idle must be at least 1")]
    IdleBudget,
}

/// Terrain streaming configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Edge length of one chunk in world units.
    pub chunk_world_size: f32,
    /// Render grid subdivisions per chunk edge (S); the mesh has (S+1)^2 vertices.
    pub subdivisions: u32,
    /// Render-to-collision resolution ratio; the collision grid has (S/ratio + 1)^2 samples.
    pub collision_ratio: u32,
    /// Chunk radius (R) of the square window kept live around the viewpoint.
    pub render_distance: i32,
    /// Factor mapping world units into oracle sample space.
    pub sample_scale: f32,
    /// Vertical scale applied to oracle heights in the render mesh.
    pub render_height_scale: f32,
    /// Declared vertical extent of the collision heightfield.
    pub vertical_unit: f32,
    /// Noise parameters for both grids.
    pub noise: NoiseParams,
    /// Vertical bias added to every oracle sample.
    pub height_offset: f32,
    /// Build stages executed per idle slice.
    pub builds_per_idle: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_world_size: 512.0,
            subdivisions: 128,
            collision_ratio: 4,
            render_distance: 1,
            // 512 world units per chunk map onto 64 sample units.
            sample_scale: 0.125,
            render_height_scale: 80.0,
            vertical_unit: 80.0,
            noise: NoiseParams::default(),
            height_offset: 0.0,
            builds_per_idle: 4,
        }
    }
}

impl TerrainConfig {
    /// Check every invariant the builder and window rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.chunk_world_size.is_finite() && self.chunk_world_size > 0.0) {
            return Err(ConfigError::ChunkSize(self.chunk_world_size));
        }
        if self.subdivisions == 0 {
            return Err(ConfigError::Subdivisions);
        }
        if self.collision_ratio == 0 || self.subdivisions % self.collision_ratio != 0 {
            return Err(ConfigError::CollisionRatio {
                ratio: self.collision_ratio,
                subdivisions: self.subdivisions,
            });
        }
        if !(self.sample_scale.is_finite() && self.sample_scale > 0.0) {
            return Err(ConfigError::SampleScale(self.sample_scale));
        }
        if !(0..=MAX_RENDER_DISTANCE).contains(&self.render_distance) {
            return Err(ConfigError::RenderDistance(self.render_distance));
        }
        if self.builds_per_idle == 0 {
            return Err(ConfigError::IdleBudget);
        }
        let noise = &self.noise;
        for (name, value) in [
            ("frequency", noise.frequency),
            ("lacunarity", noise.lacunarity),
            ("amplitude", noise.amplitude),
            ("persistence", noise.persistence),
            ("height_offset", self.height_offset),
            ("render_height_scale", self.render_height_scale),
            ("vertical_unit", self.vertical_unit),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::Noise(name));
            }
        }
        Ok(())
    }

    /// Chunk edge length in sample space.
    pub fn sample_extent(&self) -> f32 {
        self.chunk_world_size * self.sample_scale
    }

    /// Sample-space distance between adjacent render vertices.
    pub fn fine_step(&self) -> f32 {
        self.sample_extent() / self.subdivisions as f32
    }

    /// Render vertices per chunk edge (S+1).
    pub fn render_verts(&self) -> usize {
        self.subdivisions as usize + 1
    }

    /// Collision cells per chunk edge (C = S / ratio).
    pub fn collision_subdivisions(&self) -> u32 {
        self.subdivisions / self.collision_ratio
    }

    /// Collision samples per chunk edge (C+1).
    pub fn collision_verts(&self) -> usize {
        self.collision_subdivisions() as usize + 1
    }

    /// Sample-space distance between adjacent collision samples.
    pub fn collision_step(&self) -> f32 {
        self.fine_step() * self.collision_ratio as f32
    }

    /// World-space distance between adjacent render vertices.
    pub fn cell_world_size(&self) -> f32 {
        self.chunk_world_size / self.subdivisions as f32
    }

    /// Sample-space origin of the chunk's first row and column.
    pub fn sample_origin(&self, key: ChunkKey) -> (f32, f32) {
        let extent = self.sample_extent();
        (key.x as f32 * extent, key.z as f32 * extent)
    }

    /// World-space placement of the chunk's local frame.
    pub fn world_offset(&self, key: ChunkKey) -> [f32; 3] {
        [
            key.x as f32 * self.chunk_world_size,
            0.0,
            key.z as f32 * self.chunk_world_size,
        ]
    }
}
