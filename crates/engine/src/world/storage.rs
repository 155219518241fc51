use super::block::{self, BlockId};
use super::position::{BlockPos, ChunkPos, LocalBlockPos};
use crate::error::VoxelError;

/// Dense block grid for a bounded world, plus the chunk grid laid over it.
///
/// Stored as one flat array indexed by `x + y * width + z * width * height`.
/// Every access goes through a bounds check; there is no unchecked path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoxelStorage {
    width: usize,
    height: usize,
    depth: usize,
    chunk_size: usize,
    blocks: Vec<BlockId>,
}

impl VoxelStorage {
    /// An all-air world.
    pub fn new(
        width: usize,
        height: usize,
        depth: usize,
        chunk_size: usize,
    ) -> Result<Self, VoxelError> {
        if width == 0 || height == 0 || depth == 0 || chunk_size == 0 {
            return Err(VoxelError::InvalidDimensions {
                width,
                height,
                depth,
                chunk_size,
            });
        }
        // Coordinates are i32 on the public API.
        if [width, height, depth].iter().any(|d| *d > i32::MAX as usize) {
            return Err(VoxelError::InvalidDimensions {
                width,
                height,
                depth,
                chunk_size,
            });
        }
        Ok(Self {
            width,
            height,
            depth,
            chunk_size,
            blocks: vec![BlockId::AIR; width * height * depth],
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.depth)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Blocks in one chunk array (`chunk_size³`).
    pub fn chunk_volume(&self) -> usize {
        self.chunk_size * self.chunk_size * self.chunk_size
    }

    /// Number of chunks along each axis: `ceil(dim / chunk_size)`.
    pub fn chunk_counts(&self) -> (usize, usize, usize) {
        (
            self.width.div_ceil(self.chunk_size),
            self.height.div_ceil(self.chunk_size),
            self.depth.div_ceil(self.chunk_size),
        )
    }

    pub fn chunk_count(&self) -> usize {
        let (cx, cy, cz) = self.chunk_counts();
        cx * cy * cz
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.z >= 0
            && (pos.x as usize) < self.width
            && (pos.y as usize) < self.height
            && (pos.z as usize) < self.depth
    }

    pub fn contains_chunk(&self, pos: ChunkPos) -> bool {
        let (cx, cy, cz) = self.chunk_counts();
        pos.x >= 0
            && pos.y >= 0
            && pos.z >= 0
            && (pos.x as usize) < cx
            && (pos.y as usize) < cy
            && (pos.z as usize) < cz
    }

    fn index(&self, pos: BlockPos) -> Result<usize, VoxelError> {
        if !self.contains(pos) {
            return Err(VoxelError::OutOfBounds {
                pos,
                dims: self.dims(),
            });
        }
        Ok(self.flat_index(pos))
    }

    /// Caller guarantees `pos` is in bounds.
    fn flat_index(&self, pos: BlockPos) -> usize {
        let (x, y, z) = (pos.x as usize, pos.y as usize, pos.z as usize);
        x + y * self.width + z * self.width * self.height
    }

    pub fn get(&self, pos: BlockPos) -> Result<BlockId, VoxelError> {
        Ok(self.blocks[self.index(pos)?])
    }

    /// Write a block. The id must be registered.
    pub fn set(&mut self, pos: BlockPos, block: BlockId) -> Result<(), VoxelError> {
        block::lookup(block)?;
        let i = self.index(pos)?;
        self.blocks[i] = block;
        Ok(())
    }

    /// The block at `pos`, or `None` past the edge of the world.
    pub fn neighbor(&self, pos: BlockPos) -> Option<BlockId> {
        self.get(pos).ok()
    }

    /// Every block as `(id, position)`, X outermost, then Y, then Z innermost.
    /// Each call starts a fresh pass.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, BlockPos)> + Clone + '_ {
        let (w, h, d) = (self.width as i32, self.height as i32, self.depth as i32);
        (0..w).flat_map(move |x| {
            (0..h).flat_map(move |y| {
                (0..d).map(move |z| {
                    let pos = BlockPos::new(x, y, z);
                    (self.blocks[self.flat_index(pos)], pos)
                })
            })
        })
    }

    /// Every chunk position, in the same nesting order as [`Self::blocks`].
    pub fn chunks(&self) -> impl Iterator<Item = ChunkPos> + Clone + use<> {
        let (cx, cy, cz) = self.chunk_counts();
        let (cx, cy, cz) = (cx as i32, cy as i32, cz as i32);
        (0..cx).flat_map(move |x| {
            (0..cy).flat_map(move |y| (0..cz).map(move |z| ChunkPos::new(x, y, z)))
        })
    }

    /// Linear chunk index: `cx + cy * count_x + cz * count_x * count_y`.
    pub fn chunk_index(&self, pos: ChunkPos) -> Result<usize, VoxelError> {
        if !self.contains_chunk(pos) {
            return Err(VoxelError::ChunkOutOfRange(pos));
        }
        let (nx, ny, _) = self.chunk_counts();
        Ok(pos.x as usize + pos.y as usize * nx + pos.z as usize * nx * ny)
    }

    /// Chunk index of the chunk owning a world position.
    pub fn chunk_index_of(&self, pos: BlockPos) -> Result<usize, VoxelError> {
        if !self.contains(pos) {
            return Err(VoxelError::OutOfBounds {
                pos,
                dims: self.dims(),
            });
        }
        self.chunk_index(pos.chunk(self.chunk_size))
    }

    /// Inverse of [`Self::chunk_index`].
    pub fn chunk_pos_from_index(&self, index: usize) -> Result<ChunkPos, VoxelError> {
        let (nx, ny, _) = self.chunk_counts();
        let pos = ChunkPos::new(
            (index % nx) as i32,
            ((index / nx) % ny) as i32,
            (index / (nx * ny)) as i32,
        );
        if index >= self.chunk_count() {
            return Err(VoxelError::ChunkOutOfRange(pos));
        }
        Ok(pos)
    }

    /// The chunk's blocks as a flat `chunk_size³` array in
    /// [`LocalBlockPos::index`] order. Cells past the world edge read as air.
    pub fn chunk_blocks(&self, chunk: ChunkPos) -> Result<Vec<BlockId>, VoxelError> {
        if !self.contains_chunk(chunk) {
            return Err(VoxelError::ChunkOutOfRange(chunk));
        }
        let s = self.chunk_size;
        let mut out = vec![BlockId::AIR; self.chunk_volume()];
        for (i, slot) in out.iter_mut().enumerate() {
            let pos = chunk.block_at(LocalBlockPos::from_index(i, s), s);
            if let Some(block) = self.neighbor(pos) {
                *slot = block;
            }
        }
        Ok(out)
    }

    /// Overwrite a chunk from a flat array. Cells past the world edge are
    /// ignored. The length is checked before anything is written.
    pub fn write_chunk(&mut self, chunk: ChunkPos, blocks: &[BlockId]) -> Result<(), VoxelError> {
        if !self.contains_chunk(chunk) {
            return Err(VoxelError::ChunkOutOfRange(chunk));
        }
        if blocks.len() != self.chunk_volume() {
            return Err(VoxelError::ChunkLength {
                expected: self.chunk_volume(),
                actual: blocks.len(),
            });
        }
        for block in blocks {
            block::lookup(*block)?;
        }
        let s = self.chunk_size;
        for (i, block) in blocks.iter().enumerate() {
            let pos = chunk.block_at(LocalBlockPos::from_index(i, s), s);
            if let Ok(idx) = self.index(pos) {
                self.blocks[idx] = *block;
            }
        }
        Ok(())
    }

    /// Block positions covered by a chunk that lie inside the world.
    pub fn chunk_positions(&self, chunk: ChunkPos) -> impl Iterator<Item = BlockPos> + '_ {
        let s = self.chunk_size as i32;
        let origin = chunk.block_origin(self.chunk_size);
        (0..s)
            .flat_map(move |x| {
                (0..s).flat_map(move |y| (0..s).map(move |z| origin.offset(x, y, z)))
            })
            .filter(move |pos| self.contains(*pos))
    }
}
