use blockworld_engine::VoxelError;
use blockworld_engine::world::position::ChunkPos;
use thiserror::Error;

use crate::store::StoreError;

/// Errors raised while moving a world between the engine and the store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Voxel(#[from] VoxelError),

    /// The stored size is three unsigned bytes.
    #[error("world {width}x{height}x{depth} exceeds the stored size format (max 255 per axis)")]
    WorldTooLarge {
        width: usize,
        height: usize,
        depth: usize,
    },

    #[error(
        "chunk ({}, {}, {}) holds {actual} blocks, expected {expected}",
        .chunk.x, .chunk.y, .chunk.z
    )]
    CorruptChunk {
        chunk: ChunkPos,
        expected: usize,
        actual: usize,
    },

    #[error("chunk ({}, {}, {}) is missing from the store", .0.x, .0.y, .0.z)]
    MissingChunk(ChunkPos),

    #[error("stored value at {key} is not {expected}")]
    InvalidValue { key: String, expected: &'static str },

    /// A fire-and-forget write that the store refused.
    #[error("write to {key} failed: {source}")]
    WriteFailed { key: String, source: StoreError },
}
