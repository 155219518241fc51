//! World handle: generation, incremental remeshing, and ray picking.

use blockworld_engine::VoxelError;
use blockworld_engine::terrain::TerrainParams;
use blockworld_engine::world::block::BlockId;
use blockworld_engine::world::position::{BlockPos, ChunkPos};
use blockworld_engine::world::storage::VoxelStorage;
use blockworld_engine::world::{BUILD_DISTANCE, World, WorldDims};

fn empty_world(w: usize, h: usize, d: usize, chunk: usize) -> World {
    let mut world = World::from_storage(0, VoxelStorage::new(w, h, d, chunk).unwrap());
    world.build_meshes().unwrap();
    world
}

#[test]
fn generated_world_has_meshes_after_build() {
    let dims = WorldDims {
        width: 16,
        height: 16,
        depth: 16,
        chunk_size: 8,
    };
    let mut world = World::generate(77, dims, TerrainParams::default()).unwrap();
    assert_eq!(world.seed(), 77);
    assert_eq!(world.dims(), dims);
    world.build_meshes().unwrap();
    assert_eq!(world.meshes().count(), 8);
    assert!(world.meshes().any(|(_, m)| !m.is_empty()));
}

#[test]
fn generation_is_reproducible() {
    let dims = WorldDims {
        width: 12,
        height: 20,
        depth: 9,
        chunk_size: 4,
    };
    let a = World::generate(5, dims, TerrainParams::default()).unwrap();
    let b = World::generate(5, dims, TerrainParams::default()).unwrap();
    assert_eq!(a.storage(), b.storage());
}

#[test]
fn set_block_rebuilds_only_the_owning_chunk() {
    let mut world = empty_world(16, 8, 8, 8);
    let chunk = world.set_block(BlockPos::new(2, 2, 2), BlockId::STONE).unwrap();
    assert_eq!(chunk, ChunkPos::new(0, 0, 0));
    assert_eq!(world.mesh(chunk).unwrap().indices.len(), 36);
    assert!(world.mesh(ChunkPos::new(1, 0, 0)).unwrap().is_empty());

    world.set_block(BlockPos::new(2, 2, 2), BlockId::AIR).unwrap();
    assert!(world.mesh(chunk).unwrap().is_empty());
}

#[test]
fn set_block_out_of_bounds_fails_without_side_effects() {
    let mut world = empty_world(8, 8, 8, 8);
    let err = world.set_block(BlockPos::new(8, 0, 0), BlockId::STONE).unwrap_err();
    assert!(matches!(err, VoxelError::OutOfBounds { .. }));
    assert!(world.mesh(ChunkPos::new(0, 0, 0)).unwrap().is_empty());
}

#[test]
fn apply_chunk_replaces_blocks_and_mesh() {
    let mut world = empty_world(8, 8, 8, 4);
    let chunk = ChunkPos::new(1, 1, 1);
    let mut blocks = vec![BlockId::AIR; 64];
    blocks[0] = BlockId::GRASS;
    world.apply_chunk(chunk, &blocks).unwrap();
    assert_eq!(world.get_block(BlockPos::new(4, 4, 4)).unwrap(), BlockId::GRASS);
    assert_eq!(world.mesh(chunk).unwrap().vertices.len(), 24);

    let err = world.apply_chunk(chunk, &blocks[..10]).unwrap_err();
    assert!(matches!(err, VoxelError::ChunkLength { .. }));
    assert_eq!(world.get_block(BlockPos::new(4, 4, 4)).unwrap(), BlockId::GRASS);
}

#[test]
fn mesh_lookup_outside_grid_is_none() {
    let world = empty_world(8, 8, 8, 8);
    assert!(world.mesh(ChunkPos::new(0, 0, 1)).is_none());
    assert!(world.mesh(ChunkPos::new(-1, 0, 0)).is_none());
}

// ---------------------------------------------------------------------------
// Ray picking
// ---------------------------------------------------------------------------

#[test]
fn raycast_hits_first_solid_block() {
    let mut world = empty_world(8, 8, 8, 8);
    world.set_block(BlockPos::new(3, 2, 2), BlockId::DIRT).unwrap();
    world.set_block(BlockPos::new(5, 2, 2), BlockId::STONE).unwrap();
    let hit = world.raycast([0.0, 2.0, 2.0], [1.0, 0.0, 0.0], BUILD_DISTANCE).unwrap();
    assert_eq!(hit.block, BlockPos::new(3, 2, 2));
    assert_eq!(hit.id, BlockId::DIRT);
    assert_eq!(hit.previous, Some(BlockPos::new(2, 2, 2)));
}

#[test]
fn raycast_respects_reach() {
    let mut world = empty_world(8, 8, 8, 8);
    world.set_block(BlockPos::new(7, 2, 2), BlockId::DIRT).unwrap();
    assert!(world.raycast([0.0, 2.0, 2.0], [1.0, 0.0, 0.0], BUILD_DISTANCE).is_none());
    assert!(world.raycast([0.0, 2.0, 2.0], [1.0, 0.0, 0.0], 8.0).is_some());
}

#[test]
fn raycast_with_zero_direction_is_none() {
    let world = empty_world(4, 4, 4, 4);
    assert!(world.raycast([1.0, 1.0, 1.0], [0.0, 0.0, 0.0], 4.0).is_none());
}

#[test]
fn raycast_with_unbounded_reach_is_none() {
    let mut world = empty_world(4, 4, 4, 4);
    world.set_block(BlockPos::new(3, 1, 1), BlockId::STONE).unwrap();
    assert!(world.raycast([0.0, 1.0, 1.0], [1.0, 0.0, 0.0], f32::INFINITY).is_none());
    assert!(world.raycast([0.0, 1.0, 1.0], [1.0, 0.0, 0.0], f32::NAN).is_none());
}
