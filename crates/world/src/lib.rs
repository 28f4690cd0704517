//! Chunk streaming and dual-resolution terrain meshing.
//!
//! A [`ChunkWindow`] turns viewpoint positions into the set of chunk keys that
//! must be live, [`ChunkLifecycle`] converges the live set to that window using
//! a cooperative [`IdleQueue`], and [`ChunkBuilder`] produces a render mesh and
//! a coarser collision heightfield per chunk from a [`TerrainOracle`].

mod builder;
mod chunk;
mod config;
mod fractal;
mod heightfield;
mod lifecycle;
mod mesh;
mod oracle;
mod scheduler;
mod streamer;
mod window;

pub use builder::*;
pub use chunk::*;
pub use config::*;
pub use fractal::*;
pub use heightfield::*;
pub use lifecycle::*;
pub use mesh::*;
pub use oracle::*;
pub use scheduler::*;
pub use streamer::*;
pub use window::*;
