//! Headless render and physics collaborators.
//!
//! Stands in for a GPU scene graph and physics world: Ready chunks get a mesh
//! slot and a heightfield collider, evicted chunks lose both.

use std::collections::BTreeMap;
use std::sync::Arc;

use glam::Vec3;
use terrastream_physics::HeightfieldCollider;
use terrastream_testkit::ChunkMeshMetric;
use terrastream_world::{ChunkKey, ChunkObserver, ChunkPayload};
use tracing::{debug, warn};

/// What the scene saw since the last drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    Attached(ChunkKey),
    Detached(ChunkKey),
}

impl SceneEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            SceneEvent::Attached(_) => "chunk_attached",
            SceneEvent::Detached(_) => "chunk_detached",
        }
    }

    pub fn key(&self) -> ChunkKey {
        match self {
            SceneEvent::Attached(key) | SceneEvent::Detached(key) => *key,
        }
    }
}

#[derive(Debug)]
struct MeshSlot {
    payload: Arc<ChunkPayload>,
}

#[derive(Debug)]
pub struct HeadlessScene {
    chunk_world_size: f32,
    meshes: BTreeMap<ChunkKey, MeshSlot>,
    colliders: BTreeMap<ChunkKey, HeightfieldCollider>,
    events: Vec<SceneEvent>,
    attached_total: usize,
}

impl HeadlessScene {
    pub fn new(chunk_world_size: f32) -> Self {
        Self {
            chunk_world_size,
            meshes: BTreeMap::new(),
            colliders: BTreeMap::new(),
            events: Vec::new(),
            attached_total: 0,
        }
    }

    /// Ground height under world `(x, z)` if a collider covers it.
    pub fn ground_height(&self, x: f32, z: f32) -> Option<f32> {
        let key = ChunkKey::from_world(x, z, self.chunk_world_size);
        self.colliders.get(&key)?.height_at(x, z)
    }

    pub fn attached(&self) -> usize {
        self.meshes.len()
    }

    /// Chunks attached over the scene's lifetime.
    pub fn attached_total(&self) -> usize {
        self.attached_total
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.events)
    }

    /// Per-chunk mesh metrics for every attached chunk, in key order.
    pub fn mesh_metrics(&self) -> Vec<ChunkMeshMetric> {
        self.meshes
            .iter()
            .map(|(key, slot)| {
                let mesh = slot.payload.mesh();
                let field = slot.payload.collision();
                let unit = field.extent().height;
                ChunkMeshMetric {
                    chunk: [key.x, key.z],
                    vertices: mesh.vertices.len(),
                    triangles: mesh.triangle_count(),
                    vertex_bytes: mesh.vertex_bytes().len(),
                    collision_samples: field.verts_per_edge(),
                    height_range: [
                        field.grid().min_height() * unit,
                        field.grid().max_height() * unit,
                    ],
                    hash: mesh.hash.to_hex(),
                }
            })
            .collect()
    }
}

fn collider_for(payload: &ChunkPayload) -> anyhow::Result<HeightfieldCollider> {
    let field = payload.collision();
    let grid = field.grid();
    let extent = field.extent();
    HeightfieldCollider::new(
        grid.height(),
        grid.width(),
        grid.as_slice().to_vec(),
        Vec3::new(extent.width, extent.height, extent.depth),
        Vec3::from_array(field.world_offset()),
    )
}

impl ChunkObserver for HeadlessScene {
    fn chunk_ready(&mut self, payload: &Arc<ChunkPayload>) {
        let key = payload.key();
        match collider_for(payload) {
            Ok(collider) => {
                self.colliders.insert(key, collider);
            }
            Err(err) => warn!(chunk = %key, "failed to build collider: {err:#}"),
        }
        self.meshes.insert(
            key,
            MeshSlot {
                payload: Arc::clone(payload),
            },
        );
        self.attached_total += 1;
        self.events.push(SceneEvent::Attached(key));
        debug!(chunk = %key, attached = self.meshes.len(), "attached chunk");
    }

    fn chunk_detached(&mut self, key: ChunkKey) {
        self.meshes.remove(&key);
        self.colliders.remove(&key);
        self.events.push(SceneEvent::Detached(key));
        debug!(chunk = %key, attached = self.meshes.len(), "detached chunk");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrastream_world::{BuildOutcome, CancelToken, ChunkBuilder, NoiseOracle, TerrainConfig};

    fn payload(key: ChunkKey) -> Arc<ChunkPayload> {
        let config = TerrainConfig {
            chunk_world_size: 64.0,
            subdivisions: 8,
            collision_ratio: 2,
            sample_scale: 1.0,
            ..Default::default()
        };
        let builder = ChunkBuilder::new(config);
        let oracle = NoiseOracle::from_phrase("scene");
        match builder.build(key, &oracle, &CancelToken::new()).unwrap() {
            BuildOutcome::Built(payload) => Arc::new(payload),
            BuildOutcome::Cancelled => panic!("unexpected cancel"),
        }
    }

    #[test]
    fn attach_and_detach_track_colliders() {
        let mut scene = HeadlessScene::new(64.0);
        let key = ChunkKey::new(1, 0);
        scene.chunk_ready(&payload(key));
        assert_eq!(scene.attached(), 1);
        assert_eq!(scene.collider_count(), 1);
        assert!(scene.ground_height(64.0, 0.0).is_some());
        assert!(scene.ground_height(0.0, 0.0).is_none());

        scene.chunk_detached(key);
        assert_eq!(scene.attached(), 0);
        assert_eq!(scene.collider_count(), 0);
        assert_eq!(
            scene.drain_events(),
            vec![SceneEvent::Attached(key), SceneEvent::Detached(key)]
        );
        assert_eq!(scene.attached_total(), 1);
    }

    #[test]
    fn mesh_metrics_report_each_chunk() {
        let mut scene = HeadlessScene::new(64.0);
        scene.chunk_ready(&payload(ChunkKey::new(0, 0)));
        scene.chunk_ready(&payload(ChunkKey::new(0, 1)));
        let metrics = scene.mesh_metrics();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].chunk, [0, 1]);
        assert_eq!(metrics[0].vertices, 81);
        assert_eq!(metrics[0].triangles, 128);
        assert_eq!(metrics[0].vertex_bytes, 81 * 24);
        assert_eq!(metrics[0].collision_samples, 5);
        let [low, high] = metrics[0].height_range;
        assert!(low <= high);
        // Collider heights are world heights, so they fall inside the metric range.
        let ground = scene.ground_height(0.0, 0.0).unwrap();
        assert!(low - 1e-3 <= ground && ground <= high + 1e-3);
    }
}
