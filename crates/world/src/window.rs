//! Viewpoint-driven chunk window.

use std::collections::BTreeSet;

use glam::Vec3;
use tracing::debug;

use crate::chunk::ChunkKey;
use crate::config::{TerrainConfig, MAX_RENDER_DISTANCE};

/// Result of feeding a viewpoint position to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowChange {
    /// The viewpoint is still over the same centre chunk.
    Unchanged,
    /// The centre chunk changed (or was established for the first time).
    Moved {
        from: Option<ChunkKey>,
        to: ChunkKey,
    },
}

impl WindowChange {
    pub fn is_moved(&self) -> bool {
        matches!(self, WindowChange::Moved { .. })
    }
}

/// Square set of chunk keys around the viewpoint's chunk.
///
/// The required set is recomputed only when the centre chunk changes, so
/// small movements inside one chunk never disturb the lifecycle manager.
#[derive(Debug, Clone)]
pub struct ChunkWindow {
    chunk_world_size: f32,
    radius: i32,
    current: Option<ChunkKey>,
    required: BTreeSet<ChunkKey>,
}

impl ChunkWindow {
    pub fn new(chunk_world_size: f32, radius: i32) -> Self {
        Self {
            chunk_world_size,
            radius: radius.clamp(0, MAX_RENDER_DISTANCE),
            current: None,
            required: BTreeSet::new(),
        }
    }

    pub fn from_config(config: &TerrainConfig) -> Self {
        Self::new(config.chunk_world_size, config.render_distance)
    }

    /// Track the viewpoint. Only the horizontal components matter.
    pub fn update(&mut self, position: Vec3) -> WindowChange {
        let centre = ChunkKey::from_world(position.x, position.z, self.chunk_world_size);
        if self.current == Some(centre) {
            return WindowChange::Unchanged;
        }
        let from = self.current.replace(centre);
        self.required = keys_around(centre, self.radius);
        debug!(
            from = ?from,
            to = %centre,
            required = self.required.len(),
            "chunk window moved"
        );
        WindowChange::Moved { from, to: centre }
    }

    /// Keys the window currently requires; empty before the first update.
    pub fn required(&self) -> &BTreeSet<ChunkKey> {
        &self.required
    }

    pub fn current(&self) -> Option<ChunkKey> {
        self.current
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.required.contains(&key)
    }
}

/// Every key within Chebyshev distance `radius` of `centre`.
pub fn keys_around(centre: ChunkKey, radius: i32) -> BTreeSet<ChunkKey> {
    let mut keys = BTreeSet::new();
    for dx in -radius..=radius {
        for dz in -radius..=radius {
            keys.insert(centre.offset(dx, dz));
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_establishes_window() {
        let mut window = ChunkWindow::new(512.0, 1);
        assert!(window.required().is_empty());
        let change = window.update(Vec3::ZERO);
        assert_eq!(
            change,
            WindowChange::Moved {
                from: None,
                to: ChunkKey::ORIGIN
            }
        );
        assert_eq!(window.required().len(), 9);
        assert!(window.contains(ChunkKey::new(-1, 1)));
    }

    #[test]
    fn movement_inside_a_chunk_is_ignored() {
        let mut window = ChunkWindow::new(512.0, 1);
        window.update(Vec3::ZERO);
        assert_eq!(
            window.update(Vec3::new(200.0, 50.0, -200.0)),
            WindowChange::Unchanged
        );
        assert_eq!(window.current(), Some(ChunkKey::ORIGIN));
    }

    #[test]
    fn crossing_a_boundary_shifts_the_square() {
        let mut window = ChunkWindow::new(512.0, 1);
        window.update(Vec3::ZERO);
        let change = window.update(Vec3::new(512.0, 0.0, 0.0));
        assert!(change.is_moved());
        assert!(window.contains(ChunkKey::new(2, 0)));
        assert!(!window.contains(ChunkKey::new(-1, 0)));
        assert_eq!(window.required().len(), 9);
    }

    #[test]
    fn radius_zero_is_single_chunk() {
        let keys = keys_around(ChunkKey::new(4, -2), 0);
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec![ChunkKey::new(4, -2)]);
    }

    #[test]
    fn window_size_is_odd_square() {
        for r in 0..4 {
            let n = (2 * r + 1) as usize;
            assert_eq!(keys_around(ChunkKey::ORIGIN, r).len(), n * n);
        }
    }

    #[test]
    fn far_viewpoint_keeps_a_full_window() {
        let mut window = ChunkWindow::new(64.0, 2);
        for position in [
            Vec3::new(1.0e12, 0.0, 0.0),
            Vec3::new(-1.0e12, 0.0, 1.0e12),
            Vec3::new(f32::MAX, 0.0, f32::MIN),
        ] {
            assert!(window.update(position).is_moved());
            let centre = window.current().expect("centre after update");
            assert!(centre.x.abs() <= ChunkKey::MAX_COORD);
            assert!(centre.z.abs() <= ChunkKey::MAX_COORD);
            assert_eq!(window.required().len(), 25);
            assert!(window
                .required()
                .iter()
                .all(|key| key.chebyshev_distance(centre) <= 2));
        }
    }

    #[test]
    fn offset_saturates_at_the_edge() {
        let edge = ChunkKey::new(i32::MAX, i32::MIN);
        assert_eq!(edge.offset(1, -1), edge);
    }
}
