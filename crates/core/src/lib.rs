#![warn(missing_docs)]
//! Core primitives shared across the workspace.

pub mod seed;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use seed::WorldSeed;

/// Fixed simulation step counter (one step per viewpoint update).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any deterministic timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}
