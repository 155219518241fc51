//! Bounded voxel world engine.
//!
//! Owns the block table, dense chunked voxel storage, seeded terrain
//! generation and per-chunk mesh synthesis. Knows nothing about the
//! shared store or the renderer; those sit on top of [`world::World`].

pub mod error;
pub mod mesh;
pub mod terrain;
pub mod world;

pub use error::VoxelError;
