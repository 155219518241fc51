//! Per-chunk mesh synthesis.
//!
//! A chunk mesh is built in two passes:
//!
//! 1. **Emit** — every non-air block contributes one quad (two triangles, six
//!    unindexed vertices) per face whose neighbour is past the world edge or
//!    non-opaque. All six directions are culled the same way.
//! 2. **Weld** — the raw vertex stream is deduplicated on exact equality of
//!    all eight components, producing a vertex buffer plus an index buffer.
//!
//! Meshes are never patched: a change anywhere in a chunk rebuilds that
//! chunk's mesh from the current voxel grid.

pub mod face;

use std::collections::HashMap;

use rayon::prelude::*;

use crate::error::VoxelError;
use crate::world::block::{BLOCK_TYPE_COUNT, BlockId};
use crate::world::position::ChunkPos;
use crate::world::storage::VoxelStorage;
use face::{CORNER_UVS, FACE_COUNT, Face, QUAD_TRIANGLES};

/// One interleaved mesh vertex, laid out for direct GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    /// Bit pattern of all eight components. Two vertices weld iff their keys
    /// are equal.
    fn key(&self) -> [u32; 8] {
        let [px, py, pz] = self.position;
        let [nx, ny, nz] = self.normal;
        let [u, v] = self.uv;
        [px, py, pz, nx, ny, nz, u, v].map(f32::to_bits)
    }
}

/// Indexed triangle mesh for one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ChunkMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Layout of the shared block texture atlas: one column per block id, one
/// row per face, each cell inset by a fraction of its size so filtering
/// never samples the neighbouring cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasLayout {
    pub columns: usize,
    pub rows: usize,
    pub inset: f32,
}

impl Default for AtlasLayout {
    fn default() -> Self {
        Self {
            columns: BLOCK_TYPE_COUNT,
            rows: FACE_COUNT,
            // Half a texel of a 16px tile.
            inset: 1.0 / 32.0,
        }
    }
}

impl AtlasLayout {
    /// Atlas coordinates of a corner of `face` on a block of type `block`.
    /// `corner` is the cell-relative coordinate in `[0, 1]²`.
    pub fn uv(&self, block: BlockId, face: Face, corner: [f32; 2]) -> [f32; 2] {
        let span = 1.0 - 2.0 * self.inset;
        let u = (block.0 as f32 + self.inset + corner[0] * span) / self.columns as f32;
        let v = (face as usize as f32 + self.inset + corner[1] * span) / self.rows as f32;
        [u, v]
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkMeshBuilder {
    atlas: AtlasLayout,
}

impl ChunkMeshBuilder {
    pub fn new(atlas: AtlasLayout) -> Self {
        Self { atlas }
    }

    pub fn atlas(&self) -> &AtlasLayout {
        &self.atlas
    }

    /// Culled but unwelded vertex stream for a chunk, six vertices per
    /// visible face.
    pub fn emit(&self, storage: &VoxelStorage, chunk: ChunkPos) -> Result<Vec<Vertex>, VoxelError> {
        if !storage.contains_chunk(chunk) {
            return Err(VoxelError::ChunkOutOfRange(chunk));
        }
        let mut raw = Vec::new();
        for pos in storage.chunk_positions(chunk) {
            let block = storage.get(pos)?;
            if block.is_air() {
                continue;
            }
            let center = pos.as_array();
            for face in Face::ALL {
                let (dx, dy, dz) = face.offset();
                let exposed = match storage.neighbor(pos.offset(dx, dy, dz)) {
                    None => true,
                    Some(neighbor) => !neighbor.is_opaque(),
                };
                if !exposed {
                    continue;
                }
                let corners = face.corners();
                let normal = face.normal();
                for corner in QUAD_TRIANGLES {
                    let [ox, oy, oz] = corners[corner];
                    raw.push(Vertex {
                        position: [center[0] + ox, center[1] + oy, center[2] + oz],
                        normal,
                        uv: self.atlas.uv(block, face, CORNER_UVS[corner]),
                    });
                }
            }
        }
        Ok(raw)
    }

    pub fn build(&self, storage: &VoxelStorage, chunk: ChunkPos) -> Result<ChunkMesh, VoxelError> {
        let raw = self.emit(storage, chunk)?;
        Ok(weld(&raw))
    }

    /// Meshes for every chunk, ordered by chunk index. Chunks are independent
    /// so they are built in parallel; the call returns once all are done.
    pub fn build_all(&self, storage: &VoxelStorage) -> Result<Vec<ChunkMesh>, VoxelError> {
        (0..storage.chunk_count())
            .into_par_iter()
            .map(|i| {
                let chunk = storage.chunk_pos_from_index(i)?;
                self.build(storage, chunk)
            })
            .collect()
    }
}

/// Deduplicate a raw vertex stream into an indexed mesh.
///
/// Output is identical to scanning earlier unique vertices linearly for an
/// exact match: first occurrences keep their stream order.
pub fn weld(raw: &[Vertex]) -> ChunkMesh {
    let mut seen: HashMap<[u32; 8], u32> = HashMap::with_capacity(raw.len() / 2);
    let mut mesh = ChunkMesh {
        vertices: Vec::with_capacity(raw.len() / 2),
        indices: Vec::with_capacity(raw.len()),
    };
    for vertex in raw {
        let next = mesh.vertices.len() as u32;
        let index = *seen.entry(vertex.key()).or_insert_with(|| {
            mesh.vertices.push(*vertex);
            next
        });
        mesh.indices.push(index);
    }
    mesh
}
