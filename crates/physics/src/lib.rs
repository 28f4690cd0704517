#![warn(missing_docs)]
//! Terrain heightfield colliders.

use anyhow::{ensure, Result};
use glam::Vec3;

/// Static terrain collider built from a square grid of unit heights.
///
/// Samples are row-major with rows running along world x and columns along
/// world z. The grid spans `extent.x` by `extent.z` centred on `offset`, and
/// unit heights are multiplied by `extent.y`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightfieldCollider {
    rows: usize,
    cols: usize,
    heights: Vec<f32>,
    extent: Vec3,
    offset: Vec3,
}

impl HeightfieldCollider {
    /// Create a collider, validating grid shape and extent.
    pub fn new(
        rows: usize,
        cols: usize,
        heights: Vec<f32>,
        extent: Vec3,
        offset: Vec3,
    ) -> Result<Self> {
        ensure!(rows >= 2 && cols >= 2, "heightfield needs at least 2x2 samples, got {rows}x{cols}");
        ensure!(
            heights.len() == rows * cols,
            "heightfield expects {} samples, got {}",
            rows * cols,
            heights.len()
        );
        ensure!(
            extent.x > 0.0 && extent.z > 0.0 && extent.is_finite(),
            "heightfield extent must be positive, got {extent:?}"
        );
        ensure!(
            heights.iter().all(|h| h.is_finite()),
            "heightfield contains non-finite samples"
        );
        Ok(Self {
            rows,
            cols,
            heights,
            extent,
            offset,
        })
    }

    /// Ground height under world `(x, z)`, or `None` outside the footprint.
    ///
    /// Bilinear over the grid cell containing the point.
    pub fn height_at(&self, x: f32, z: f32) -> Option<f32> {
        let local_x = x - (self.offset.x - self.extent.x * 0.5);
        let local_z = z - (self.offset.z - self.extent.z * 0.5);
        if !(0.0..=self.extent.x).contains(&local_x) || !(0.0..=self.extent.z).contains(&local_z) {
            return None;
        }

        let fr = local_x / self.extent.x * (self.rows - 1) as f32;
        let fc = local_z / self.extent.z * (self.cols - 1) as f32;
        let r0 = (fr.floor() as usize).min(self.rows - 2);
        let c0 = (fc.floor() as usize).min(self.cols - 2);
        let tr = fr - r0 as f32;
        let tc = fc - c0 as f32;

        let h00 = self.sample(r0, c0);
        let h01 = self.sample(r0, c0 + 1);
        let h10 = self.sample(r0 + 1, c0);
        let h11 = self.sample(r0 + 1, c0 + 1);
        let near = h00 + (h01 - h00) * tc;
        let far = h10 + (h11 - h10) * tc;
        let unit = near + (far - near) * tr;
        Some(unit * self.extent.y + self.offset.y)
    }

    fn sample(&self, row: usize, col: usize) -> f32 {
        self.heights[row * self.cols + col]
    }
}
