//! Terrain generation: determinism and column layering.

use blockworld_engine::terrain::{self, TerrainGenerator, TerrainParams};
use blockworld_engine::world::block::BlockId;
use blockworld_engine::world::position::BlockPos;
use blockworld_engine::world::storage::VoxelStorage;

fn generated(seed: u32, params: TerrainParams, w: usize, h: usize, d: usize) -> VoxelStorage {
    let mut storage = VoxelStorage::new(w, h, d, 8).unwrap();
    TerrainGenerator::new(seed, params).fill(&mut storage).unwrap();
    storage
}

#[test]
fn default_params() {
    let p = TerrainParams::default();
    assert_eq!(p.scale, 20.0);
    assert_eq!(p.octaves, 4);
    assert_eq!(p.persistence, 0.5);
    assert_eq!(p.lacunarity, 1.5);
    assert_eq!(p.height_variance, 4.0);
    assert_eq!(p.surface_ratio, 0.7);
}

#[test]
fn same_seed_same_grid() {
    let a = generated(1234, TerrainParams::default(), 24, 32, 24);
    let b = generated(1234, TerrainParams::default(), 24, 32, 24);
    assert_eq!(a, b);
}

#[test]
fn different_seeds_sample_differently() {
    let a = TerrainGenerator::new(1, TerrainParams::default());
    let b = TerrainGenerator::new(2, TerrainParams::default());
    let differs = (0..32).any(|i| {
        let x = i as f64 * 3.7;
        let z = i as f64 * 1.3;
        a.sample(x, z) != b.sample(x, z)
    });
    assert!(differs);
}

#[test]
fn zero_octaves_is_flat_at_surface_level() {
    let params = TerrainParams {
        octaves: 0,
        ..TerrainParams::default()
    };
    let generator = TerrainGenerator::new(7, params);
    // round(10 * 0.7) = 7
    for x in 0..5 {
        for z in 0..5 {
            assert_eq!(generator.surface_height(x, z, 10), 7);
        }
    }
}

#[test]
fn column_block_layers() {
    assert_eq!(terrain::column_block(5, 5), BlockId::GRASS);
    assert_eq!(terrain::column_block(4, 5), BlockId::DIRT);
    assert_eq!(terrain::column_block(0, 5), BlockId::DIRT);
    assert_eq!(terrain::column_block(6, 5), BlockId::AIR);
}

/// 8x8x8 world, one chunk, fixed seed: grass only at each column's computed
/// surface, dirt strictly below, air strictly above.
#[test]
fn single_chunk_columns_are_layered() {
    let params = TerrainParams {
        scale: 20.0,
        octaves: 4,
        persistence: 0.5,
        lacunarity: 1.5,
        ..TerrainParams::default()
    };
    let seed = 4242;
    let storage = generated(seed, params, 8, 8, 8);
    assert_eq!(storage.chunk_count(), 1);
    let generator = TerrainGenerator::new(seed, params);

    // Surface level for height 8 is round(8 * 0.7) = 6; four blocks per unit of noise.
    for (x, z) in [(0, 0), (3, 5), (7, 2), (6, 7)] {
        let expected = (generator.sample(x as f64, z as f64) * 4.0 + 0.5).floor() as i64 + 6;
        assert_eq!(generator.surface_height(x, z, 8), expected, "column ({x}, {z})");
    }

    for x in 0..8 {
        for z in 0..8 {
            let surface = generator.surface_height(x, z, 8);
            let mut grass = 0;
            for y in 0..8 {
                let block = storage.get(BlockPos::new(x, y, z)).unwrap();
                let y = y as i64;
                if y == surface {
                    assert_eq!(block, BlockId::GRASS);
                    grass += 1;
                } else if y < surface {
                    assert_eq!(block, BlockId::DIRT);
                } else {
                    assert_eq!(block, BlockId::AIR);
                }
            }
            assert!(grass <= 1);
        }
    }
}

#[test]
fn surface_stays_near_surface_level() {
    // |noise| <= 1 per octave, so |value| < 1 + 0.5 + 0.25 + 0.125.
    let generator = TerrainGenerator::new(99, TerrainParams::default());
    for x in 0..64 {
        for z in 0..64 {
            let h = generator.surface_height(x, z, 64);
            assert!((45 - 12..=45 + 12).contains(&h), "column ({x}, {z}) at {h}");
        }
    }
}
