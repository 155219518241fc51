pub mod block;
pub mod position;
pub mod storage;

use block::BlockId;
use position::{BlockPos, ChunkPos};
use serde::{Deserialize, Serialize};
use storage::VoxelStorage;

use crate::error::VoxelError;
use crate::mesh::{ChunkMesh, ChunkMeshBuilder};
use crate::terrain::{TerrainGenerator, TerrainParams};

/// Reach of a player's block edits, in blocks.
pub const BUILD_DISTANCE: f32 = 4.0;

/// Ray marching step for [`World::raycast`].
const RAY_STEP: f32 = 0.05;

/// World size and chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldDims {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub chunk_size: usize,
}

impl Default for WorldDims {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            depth: 64,
            chunk_size: 8,
        }
    }
}

/// Result of [`World::raycast`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayHit {
    /// First solid block along the ray.
    pub block: BlockPos,
    pub id: BlockId,
    /// Last empty in-world cell before the hit; where a placed block goes.
    pub previous: Option<BlockPos>,
}

/// The whole block world of one session: voxel grid plus one mesh per chunk.
///
/// The world is the only owner of its storage and meshes. Every mutation
/// goes through it so a chunk's mesh is rebuilt whenever its blocks change.
pub struct World {
    seed: u32,
    storage: VoxelStorage,
    /// Indexed by [`VoxelStorage::chunk_index`].
    meshes: Vec<ChunkMesh>,
    builder: ChunkMeshBuilder,
}

impl World {
    /// Generate a fresh world from a seed. Meshes are not built yet.
    pub fn generate(seed: u32, dims: WorldDims, params: TerrainParams) -> Result<Self, VoxelError> {
        let mut storage = VoxelStorage::new(dims.width, dims.height, dims.depth, dims.chunk_size)?;
        TerrainGenerator::new(seed, params).fill(&mut storage)?;
        tracing::info!(
            "Generated {}x{}x{} world (seed {}, {} chunks)",
            dims.width,
            dims.height,
            dims.depth,
            seed,
            storage.chunk_count()
        );
        Ok(Self::from_storage(seed, storage))
    }

    /// Wrap existing voxel data (e.g. retrieved from the shared store).
    pub fn from_storage(seed: u32, storage: VoxelStorage) -> Self {
        let meshes = vec![ChunkMesh::default(); storage.chunk_count()];
        Self {
            seed,
            storage,
            meshes,
            builder: ChunkMeshBuilder::default(),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn storage(&self) -> &VoxelStorage {
        &self.storage
    }

    pub fn dims(&self) -> WorldDims {
        let (width, height, depth) = self.storage.dims();
        WorldDims {
            width,
            height,
            depth,
            chunk_size: self.storage.chunk_size(),
        }
    }

    pub fn mesh_builder(&self) -> &ChunkMeshBuilder {
        &self.builder
    }

    pub fn get_block(&self, pos: BlockPos) -> Result<BlockId, VoxelError> {
        self.storage.get(pos)
    }

    /// Write a block and rebuild the owning chunk's mesh. Returns the chunk
    /// so the caller can push it to the shared store.
    pub fn set_block(&mut self, pos: BlockPos, block: BlockId) -> Result<ChunkPos, VoxelError> {
        self.storage.set(pos, block)?;
        let chunk = pos.chunk(self.storage.chunk_size());
        self.rebuild_chunk(chunk)?;
        Ok(chunk)
    }

    /// Replace a chunk's blocks wholesale and rebuild its mesh.
    pub fn apply_chunk(&mut self, chunk: ChunkPos, blocks: &[BlockId]) -> Result<(), VoxelError> {
        self.storage.write_chunk(chunk, blocks)?;
        self.rebuild_chunk(chunk)
    }

    /// Mesh every chunk.
    pub fn build_meshes(&mut self) -> Result<(), VoxelError> {
        self.meshes = self.builder.build_all(&self.storage)?;
        let triangles: usize = self.meshes.iter().map(ChunkMesh::triangle_count).sum();
        tracing::debug!("Built {} chunk meshes ({} triangles)", self.meshes.len(), triangles);
        Ok(())
    }

    /// Re-derive one chunk's mesh from the current voxel grid.
    pub fn rebuild_chunk(&mut self, chunk: ChunkPos) -> Result<(), VoxelError> {
        let index = self.storage.chunk_index(chunk)?;
        self.meshes[index] = self.builder.build(&self.storage, chunk)?;
        tracing::trace!("Rebuilt chunk ({}, {}, {})", chunk.x, chunk.y, chunk.z);
        Ok(())
    }

    pub fn mesh(&self, chunk: ChunkPos) -> Option<&ChunkMesh> {
        let index = self.storage.chunk_index(chunk).ok()?;
        self.meshes.get(index)
    }

    /// Every chunk mesh with its chunk coordinate, in chunk index order.
    pub fn meshes(&self) -> impl Iterator<Item = (ChunkPos, &ChunkMesh)> + '_ {
        self.storage.chunks().filter_map(move |chunk| self.mesh(chunk).map(|m| (chunk, m)))
    }

    /// March along a ray from `origin` and return the first non-air block
    /// within `max_distance`. Blocks are unit cubes centred on integer
    /// coordinates.
    pub fn raycast(
        &self,
        origin: [f32; 3],
        direction: [f32; 3],
        max_distance: f32,
    ) -> Option<RayHit> {
        let len = direction.iter().map(|c| c * c).sum::<f32>().sqrt();
        if len == 0.0 || !len.is_finite() || !max_distance.is_finite() {
            return None;
        }
        let dir = direction.map(|c| c / len);
        let cell = |t: f32| {
            BlockPos::new(
                (origin[0] + dir[0] * t).round() as i32,
                (origin[1] + dir[1] * t).round() as i32,
                (origin[2] + dir[2] * t).round() as i32,
            )
        };

        let mut previous = None;
        let mut last = None;
        let mut t = 0.0;
        while t <= max_distance {
            let pos = cell(t);
            t += RAY_STEP;
            if last == Some(pos) {
                continue;
            }
            last = Some(pos);
            match self.storage.neighbor(pos) {
                Some(id) if !id.is_air() => {
                    return Some(RayHit {
                        block: pos,
                        id,
                        previous,
                    });
                }
                Some(_) => previous = Some(pos),
                None => {}
            }
        }
        None
    }
}
