use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::builder::ChunkPayload;
use crate::config::MAX_RENDER_DISTANCE;

/// Chunk coordinate (X,Z) in chunk space.
/// Implements Ord for deterministic iteration in BTreeMap/BTreeSet (sorts by x, then z).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize,
    serde::Deserialize,
)]
pub struct ChunkKey {
    pub x: i32,
    pub z: i32,
}

impl ChunkKey {
    pub const ORIGIN: Self = Self::new(0, 0);

    /// Largest coordinate a viewpoint maps to; any window around it stays in `i32`.
    pub const MAX_COORD: i32 = i32::MAX - MAX_RENDER_DISTANCE;

    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the world-space point `(world_x, world_z)`.
    ///
    /// Chunk centres sit on multiples of `chunk_world_size`, so the chunk under
    /// the origin spans `[-size/2, size/2)` on both axes. Points beyond
    /// [`ChunkKey::MAX_COORD`] chunks clamp to the edge of the addressable world.
    pub fn from_world(world_x: f32, world_z: f32, chunk_world_size: f32) -> Self {
        let axis = |world: f32| {
            let chunk = (world / chunk_world_size + 0.5).floor() as i32;
            chunk.clamp(-Self::MAX_COORD, Self::MAX_COORD)
        };
        Self::new(axis(world_x), axis(world_z))
    }

    /// Square-ring distance used for window membership and dispatch priority.
    pub fn chebyshev_distance(self, other: Self) -> u32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).unsigned_abs();
        dx.max(dz) as u32
    }

    /// Key shifted by `(dx, dz)` chunks, saturating at the `i32` range.
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.z.saturating_add(dz))
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Generation state of a live chunk record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChunkState {
    /// Inserted and queued; no sampling has happened yet.
    Requested,
    /// Render samples taken; collision sampling and assembly pending.
    Generating,
    /// Mesh and collision field published.
    Ready,
    /// Generation stopped, either by eviction or by failure.
    Cancelled,
}

impl ChunkState {
    /// Whether `self -> next` is a legal edge of the generation state machine.
    pub fn can_transition_to(self, next: ChunkState) -> bool {
        matches!(
            (self, next),
            (ChunkState::Requested, ChunkState::Generating)
                | (ChunkState::Generating, ChunkState::Ready)
                | (ChunkState::Generating, ChunkState::Cancelled)
        )
    }
}

/// Shared cancellation flag handed to a chunk's pending build work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// True when both handles refer to the same generation attempt.
    pub fn same_attempt(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.flag, &other.flag)
    }
}

/// One entry per live or in-flight chunk.
#[derive(Debug)]
pub struct ChunkRecord {
    key: ChunkKey,
    state: ChunkState,
    payload: Option<Arc<ChunkPayload>>,
    cancel: CancelToken,
}

impl ChunkRecord {
    /// Fresh record in the Requested state with its own cancel token.
    pub fn requested(key: ChunkKey) -> Self {
        Self {
            key,
            state: ChunkState::Requested,
            payload: None,
            cancel: CancelToken::new(),
        }
    }

    #[inline]
    pub fn key(&self) -> ChunkKey {
        self.key
    }

    #[inline]
    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Render mesh and collision field, present only once Ready.
    pub fn payload(&self) -> Option<&Arc<ChunkPayload>> {
        self.payload.as_ref()
    }

    /// Requested -> Generating.
    pub fn begin_generating(&mut self) {
        self.transition(ChunkState::Generating);
    }

    /// Generating -> Ready, publishing mesh and collision field together.
    pub fn mark_ready(&mut self, payload: Arc<ChunkPayload>) {
        debug_assert!(self.payload.is_none(), "payload for {} set twice", self.key);
        self.transition(ChunkState::Ready);
        self.payload = Some(payload);
    }

    /// Generating -> Cancelled. Also trips the cancel token.
    pub fn mark_cancelled(&mut self) {
        self.cancel.cancel();
        self.transition(ChunkState::Cancelled);
    }

    fn transition(&mut self, next: ChunkState) {
        assert!(
            self.state.can_transition_to(next),
            "illegal chunk transition {:?} -> {:?} for {}",
            self.state,
            next,
            self.key
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_world_centres_chunks_on_multiples() {
        let size = 512.0;
        assert_eq!(ChunkKey::from_world(0.0, 0.0, size), ChunkKey::new(0, 0));
        assert_eq!(ChunkKey::from_world(255.9, -255.9, size), ChunkKey::new(0, 0));
        assert_eq!(ChunkKey::from_world(256.0, 0.0, size), ChunkKey::new(1, 0));
        assert_eq!(ChunkKey::from_world(-256.1, 0.0, size), ChunkKey::new(-1, 0));
        assert_eq!(ChunkKey::from_world(512.0, 1024.0, size), ChunkKey::new(1, 2));
    }

    #[test]
    fn chebyshev_distance_is_square() {
        let origin = ChunkKey::ORIGIN;
        assert_eq!(origin.chebyshev_distance(ChunkKey::new(2, -1)), 2);
        assert_eq!(origin.chebyshev_distance(ChunkKey::new(-3, 3)), 3);
        assert_eq!(origin.chebyshev_distance(origin), 0);
    }

    #[test]
    fn test_chunk_key_display() {
        let key = ChunkKey::new(5, -3);
        assert_eq!(format!("{}", key), "(5, -3)");
    }

    #[test]
    fn test_chunk_key_ordering() {
        let a = ChunkKey::new(0, 0);
        let b = ChunkKey::new(1, 0);
        let c = ChunkKey::new(0, 1);
        assert!(a < b);
        assert!(a < c);
        assert!(c < b);
    }

    #[test]
    fn test_chunk_key_serialization() {
        let key = ChunkKey::new(-5, 10);
        let serialized = serde_json::to_string(&key).unwrap();
        let deserialized: ChunkKey = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, key);
    }

    #[test]
    fn legal_transitions_only() {
        use ChunkState::*;
        assert!(Requested.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Ready));
        assert!(Generating.can_transition_to(Cancelled));
        assert!(!Requested.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Generating));
        assert!(!Cancelled.can_transition_to(Generating));
    }

    #[test]
    fn cancel_marks_token() {
        let mut record = ChunkRecord::requested(ChunkKey::new(1, 1));
        let token = record.cancel_token().clone();
        record.begin_generating();
        record.mark_cancelled();
        assert!(token.is_cancelled());
        assert_eq!(record.state(), ChunkState::Cancelled);
        assert!(record.payload().is_none());
    }

    #[test]
    #[should_panic(expected = "illegal chunk transition")]
    fn requested_cannot_jump_to_cancelled() {
        let mut record = ChunkRecord::requested(ChunkKey::ORIGIN);
        record.mark_cancelled();
    }

    #[test]
    fn tokens_identify_attempts() {
        let a = ChunkRecord::requested(ChunkKey::ORIGIN);
        let b = ChunkRecord::requested(ChunkKey::ORIGIN);
        let a_clone = a.cancel_token().clone();
        assert!(a.cancel_token().same_attempt(&a_clone));
        assert!(!a.cancel_token().same_attempt(b.cancel_token()));
    }
}
