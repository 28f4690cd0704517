//! Height grids produced by the oracle.
//!
//! [`HeightGrid`] is the validated, row-major form of an oracle response.
//! [`CollisionField`] wraps the coarse grid handed to the physics collaborator.

use serde::Serialize;

use crate::builder::GenerationError;

/// Row-major grid of finite heights.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    width: usize,
    height: usize,
    heights: Vec<f32>,
}

impl HeightGrid {
    /// Validate an oracle response for a `width * height` request.
    pub fn from_samples(
        width: usize,
        height: usize,
        heights: Vec<f32>,
    ) -> Result<Self, GenerationError> {
        let expected = width * height;
        if heights.len() != expected {
            return Err(GenerationError::MalformedGrid {
                expected,
                actual: heights.len(),
            });
        }
        if let Some((index, value)) = heights.iter().enumerate().find(|(_, h)| !h.is_finite()) {
            return Err(GenerationError::NonFiniteHeight {
                index,
                value: *value,
            });
        }
        Ok(Self {
            width,
            height,
            heights,
        })
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Height at (`col`, `row`).
    ///
    /// # Panics
    /// Panics if coordinates are out of bounds.
    pub fn get(&self, col: usize, row: usize) -> f32 {
        assert!(col < self.width, "col out of bounds");
        assert!(row < self.height, "row out of bounds");
        self.heights[row * self.width + col]
    }

    /// Raw row-major samples.
    pub fn as_slice(&self) -> &[f32] {
        &self.heights
    }

    /// Lowest sample.
    pub fn min_height(&self) -> f32 {
        self.heights.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Highest sample.
    pub fn max_height(&self) -> f32 {
        self.heights.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Declared physical extent of a collision heightfield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeightfieldExtent {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

/// Coarse collision heightfield for one chunk.
///
/// Samples are stored in the physics convention: row `r`, column `c` lies at
/// local x = `r * cell`, local z = `c * cell` (the transpose of the render grid).
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionField {
    grid: HeightGrid,
    extent: HeightfieldExtent,
    world_offset: [f32; 3],
}

impl CollisionField {
    pub fn new(grid: HeightGrid, extent: HeightfieldExtent, world_offset: [f32; 3]) -> Self {
        Self {
            grid,
            extent,
            world_offset,
        }
    }

    /// Samples per edge (C+1).
    pub fn verts_per_edge(&self) -> usize {
        self.grid.width()
    }

    pub fn grid(&self) -> &HeightGrid {
        &self.grid
    }

    pub fn extent(&self) -> HeightfieldExtent {
        self.extent
    }

    pub fn world_offset(&self) -> [f32; 3] {
        self.world_offset
    }

    /// Unscaled height at sample indices along world x (`ix`) and world z (`iz`).
    pub fn sample(&self, ix: usize, iz: usize) -> f32 {
        self.grid.get(iz, ix)
    }
}
