/// Absolute block position in the world.
///
/// Signed so that neighbour arithmetic at the world edge (x - 1 at x = 0)
/// produces a position that bounds checks can reject instead of wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The chunk this block belongs to.
    pub const fn chunk(&self, chunk_size: usize) -> ChunkPos {
        let s = chunk_size as i32;
        ChunkPos {
            x: self.x.div_euclid(s),
            y: self.y.div_euclid(s),
            z: self.z.div_euclid(s),
        }
    }

    /// Position within the owning chunk (0..chunk_size on each axis).
    pub const fn local(&self, chunk_size: usize) -> LocalBlockPos {
        let s = chunk_size as i32;
        LocalBlockPos {
            x: self.x.rem_euclid(s) as usize,
            y: self.y.rem_euclid(s) as usize,
            z: self.z.rem_euclid(s) as usize,
        }
    }

    pub const fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// The six cardinal neighbors.
    pub const fn neighbors(&self) -> [BlockPos; 6] {
        [
            self.offset(1, 0, 0),
            self.offset(-1, 0, 0),
            self.offset(0, 1, 0),
            self.offset(0, -1, 0),
            self.offset(0, 0, 1),
            self.offset(0, 0, -1),
        ]
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }
}

/// Chunk position in the chunk grid (not block coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// World position of the chunk's lowest corner block.
    pub const fn block_origin(&self, chunk_size: usize) -> BlockPos {
        let s = chunk_size as i32;
        BlockPos::new(self.x * s, self.y * s, self.z * s)
    }

    /// World position of a chunk-local block.
    pub const fn block_at(&self, local: LocalBlockPos, chunk_size: usize) -> BlockPos {
        self.block_origin(chunk_size)
            .offset(local.x as i32, local.y as i32, local.z as i32)
    }
}

/// Block position local to a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalBlockPos {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl LocalBlockPos {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x, y, z }
    }

    /// Index into a flat `chunk_size³` chunk array: x fastest, then y, then z.
    pub const fn index(&self, chunk_size: usize) -> usize {
        self.x + self.y * chunk_size + self.z * chunk_size * chunk_size
    }

    /// Inverse of [`LocalBlockPos::index`].
    pub const fn from_index(i: usize, chunk_size: usize) -> Self {
        let plane = chunk_size * chunk_size;
        let z = i / plane;
        let rem = i % plane;
        Self {
            x: rem % chunk_size,
            y: rem / chunk_size,
            z,
        }
    }
}
