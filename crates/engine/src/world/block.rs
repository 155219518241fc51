use crate::error::VoxelError;

/// Block-type identifier as it is stored in the voxel grid and on the wire.
///
/// Ids index into [`BLOCK_TYPES`]. `BlockId::AIR` (0) is the empty block: it
/// is never opaque and never meshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BlockId(pub u8);

impl BlockId {
    pub const AIR: BlockId = BlockId(BlockKind::Air as u8);
    pub const BANDED_IRON: BlockId = BlockId(BlockKind::BandedIron as u8);
    pub const STONE: BlockId = BlockId(BlockKind::Stone as u8);
    pub const DIRT: BlockId = BlockId(BlockKind::Dirt as u8);
    pub const GRASS: BlockId = BlockId(BlockKind::Grass as u8);

    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    pub const fn is_air(self) -> bool {
        self.0 == Self::AIR.0
    }

    /// Opacity of this block. Ids outside the table are treated as
    /// non-opaque so a bad id never hides a neighbour's face.
    pub fn is_opaque(self) -> bool {
        lookup(self).is_ok_and(|t| t.opaque)
    }

    /// The id for a raw byte, if it names a registered block.
    pub fn checked(raw: u8) -> Option<Self> {
        let id = BlockId(raw);
        lookup(id).ok().map(|_| id)
    }

    /// Convert a single raw id read from external data. Unknown ids become
    /// air and are logged.
    pub fn from_stored(raw: u8) -> Self {
        Self::checked(raw).unwrap_or_else(|| {
            tracing::warn!("Unknown block id {} in imported data, defaulting to air", raw);
            BlockId::AIR
        })
    }
}

/// The closed set of block kinds, in id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockKind {
    Air = 0,
    BandedIron = 1,
    Stone = 2,
    Dirt = 3,
    Grass = 4,
}

impl BlockKind {
    pub const fn id(self) -> BlockId {
        BlockId(self as u8)
    }
}

/// Static metadata for one block kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockType {
    pub id: BlockId,
    pub kind: BlockKind,
    pub name: &'static str,
    pub opaque: bool,
}

/// Process-wide block table, indexed by id.
pub static BLOCK_TYPES: [BlockType; 5] = [
    BlockType {
        id: BlockId(0),
        kind: BlockKind::Air,
        name: "air",
        opaque: false,
    },
    BlockType {
        id: BlockId(1),
        kind: BlockKind::BandedIron,
        name: "banded iron",
        opaque: true,
    },
    BlockType {
        id: BlockId(2),
        kind: BlockKind::Stone,
        name: "stone",
        opaque: true,
    },
    BlockType {
        id: BlockId(3),
        kind: BlockKind::Dirt,
        name: "dirt",
        opaque: true,
    },
    BlockType {
        id: BlockId(4),
        kind: BlockKind::Grass,
        name: "grass",
        opaque: true,
    },
];

/// Number of registered block kinds (also the atlas column count).
pub const BLOCK_TYPE_COUNT: usize = BLOCK_TYPES.len();

/// Look up a block's metadata. Fails only for ids past the end of the table.
pub fn lookup(id: BlockId) -> Result<&'static BlockType, VoxelError> {
    BLOCK_TYPES
        .get(id.0 as usize)
        .ok_or(VoxelError::UnknownBlock(id.0))
}
