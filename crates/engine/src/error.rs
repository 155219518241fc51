use thiserror::Error;

use crate::world::position::{BlockPos, ChunkPos};

/// Errors raised by the voxel engine.
///
/// Bounds violations are always reported; the engine never clamps or wraps a
/// coordinate on the caller's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoxelError {
    #[error(
        "block position ({}, {}, {}) is outside the {}x{}x{} world",
        .pos.x, .pos.y, .pos.z, .dims.0, .dims.1, .dims.2
    )]
    OutOfBounds {
        pos: BlockPos,
        dims: (usize, usize, usize),
    },

    #[error("chunk ({}, {}, {}) is outside the chunk grid", .0.x, .0.y, .0.z)]
    ChunkOutOfRange(ChunkPos),

    #[error("chunk array holds {actual} blocks, expected {expected}")]
    ChunkLength { expected: usize, actual: usize },

    #[error("unknown block id {0}")]
    UnknownBlock(u8),

    #[error("invalid world dimensions {width}x{height}x{depth} with chunk size {chunk_size}")]
    InvalidDimensions {
        width: usize,
        height: usize,
        depth: usize,
        chunk_size: usize,
    },
}
