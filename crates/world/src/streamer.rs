//! Window controller and lifecycle manager wired together.

use std::sync::Arc;

use glam::Vec3;

use crate::builder::{ChunkBuilder, ChunkPayload};
use crate::chunk::{ChunkKey, ChunkState};
use crate::config::{ConfigError, TerrainConfig};
use crate::lifecycle::{ChunkLifecycle, ChunkObserver, IdleReport, ReconcileReport, StreamingMetrics};
use crate::oracle::OracleHandle;
use crate::window::ChunkWindow;

/// Streams terrain chunks around a moving viewpoint.
///
/// Call [`TerrainStreamer::step`] once per frame with the viewpoint and
/// [`TerrainStreamer::run_idle`] whenever the host has spare time.
#[derive(Debug)]
pub struct TerrainStreamer {
    window: ChunkWindow,
    lifecycle: ChunkLifecycle,
    builds_per_idle: usize,
}

impl TerrainStreamer {
    pub fn new(config: TerrainConfig, oracle: OracleHandle) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = ChunkWindow::from_config(&config);
        let builds_per_idle = config.builds_per_idle;
        Ok(Self {
            window,
            lifecycle: ChunkLifecycle::new(ChunkBuilder::new(config), oracle),
            builds_per_idle,
        })
    }

    /// Feed the viewpoint. Reconciles when the centre chunk changed or a
    /// failed build needs another attempt.
    pub fn step(
        &mut self,
        position: Vec3,
        observer: &mut dyn ChunkObserver,
    ) -> Option<ReconcileReport> {
        let change = self.window.update(position);
        if let Some(centre) = self.window.current() {
            if change.is_moved() {
                self.lifecycle.set_focus(centre);
            }
        }
        if change.is_moved() || self.lifecycle.needs_retry() {
            Some(self.lifecycle.reconcile(self.window.required(), observer))
        } else {
            None
        }
    }

    /// One idle slice of at most `builds_per_idle` build stages.
    pub fn run_idle(&mut self, observer: &mut dyn ChunkObserver) -> IdleReport {
        self.lifecycle.run_idle(self.builds_per_idle, observer)
    }

    pub fn window(&self) -> &ChunkWindow {
        &self.window
    }

    pub fn lifecycle(&self) -> &ChunkLifecycle {
        &self.lifecycle
    }

    pub fn config(&self) -> &TerrainConfig {
        self.lifecycle.builder().config()
    }

    pub fn state(&self, key: ChunkKey) -> Option<ChunkState> {
        self.lifecycle.state(key)
    }

    pub fn payload(&self, key: ChunkKey) -> Option<Arc<ChunkPayload>> {
        self.lifecycle.payload(key)
    }

    pub fn metrics(&self) -> &StreamingMetrics {
        self.lifecycle.metrics()
    }

    /// Every required chunk is Ready and nothing is queued.
    pub fn is_settled(&self) -> bool {
        self.lifecycle.pending_work() == 0
            && !self.lifecycle.needs_retry()
            && self
                .window
                .required()
                .iter()
                .all(|&key| self.lifecycle.state(key) == Some(ChunkState::Ready))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::NullObserver;
    use crate::oracle::NoiseOracle;

    fn streamer() -> TerrainStreamer {
        let config = TerrainConfig {
            chunk_world_size: 64.0,
            subdivisions: 8,
            collision_ratio: 2,
            sample_scale: 1.0,
            builds_per_idle: 3,
            ..Default::default()
        };
        TerrainStreamer::new(
            config,
            OracleHandle::ready(Arc::new(NoiseOracle::from_phrase("streamer"))),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = TerrainConfig {
            collision_ratio: 3,
            ..Default::default()
        };
        assert!(TerrainStreamer::new(config, OracleHandle::pending()).is_err());
    }

    #[test]
    fn step_reconciles_only_on_move() {
        let mut s = streamer();
        let first = s.step(Vec3::ZERO, &mut NullObserver).unwrap();
        assert_eq!(first.added.len(), 9);
        assert!(s.step(Vec3::new(10.0, 0.0, 10.0), &mut NullObserver).is_none());
        let moved = s.step(Vec3::new(64.0, 0.0, 0.0), &mut NullObserver).unwrap();
        assert_eq!(moved.added.len(), 3);
        assert_eq!(moved.removed.len(), 3);
    }

    #[test]
    fn idle_slices_respect_budget_and_settle() {
        let mut s = streamer();
        s.step(Vec3::ZERO, &mut NullObserver);
        let slice = s.run_idle(&mut NullObserver);
        assert_eq!(slice.stages_run, 3);
        assert!(!s.is_settled());

        for _ in 0..10 {
            s.run_idle(&mut NullObserver);
        }
        assert!(s.is_settled());
        assert_eq!(s.metrics().built, 9);
    }

    #[test]
    fn centre_chunk_is_built_first() {
        let mut s = streamer();
        s.step(Vec3::new(128.0, 0.0, 0.0), &mut NullObserver);
        let slice = s.run_idle(&mut NullObserver);
        // Render stage, collision stage, then the next chunk's render stage.
        assert_eq!(slice.ready, vec![ChunkKey::new(2, 0)]);
    }

    #[test]
    fn far_viewpoint_reconciles_without_overflow() {
        let mut s = streamer();
        let report = s
            .step(Vec3::new(1.0e12, 0.0, 0.0), &mut NullObserver)
            .unwrap();
        assert_eq!(report.added.len(), 9);
        assert!(report
            .added
            .iter()
            .all(|key| key.x <= ChunkKey::MAX_COORD + 1));
        assert!(s
            .step(Vec3::new(2.0e12, 0.0, 0.0), &mut NullObserver)
            .is_none());
    }
}
