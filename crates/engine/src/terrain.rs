//! Seeded height-field terrain.
//!
//! Each `(x, z)` column gets a surface height from fractal (layered) simplex
//! noise. The surface block is grass, everything below it dirt, everything
//! above it air. Output depends only on the seed and [`TerrainParams`], so
//! two clients given the same inputs produce identical grids.

use noise::{NoiseFn, Simplex};
use serde::{Deserialize, Serialize};

use crate::error::VoxelError;
use crate::world::block::BlockId;
use crate::world::position::BlockPos;
use crate::world::storage::VoxelStorage;

/// Layered-noise parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    /// Horizontal stretch of the base octave.
    pub scale: f64,
    pub octaves: u32,
    /// Amplitude multiplier per octave.
    pub persistence: f64,
    /// Frequency multiplier per octave.
    pub lacunarity: f64,
    /// Blocks of height per unit of noise.
    pub height_variance: f64,
    /// Mean surface level as a fraction of world height.
    pub surface_ratio: f64,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            scale: 20.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 1.5,
            height_variance: 4.0,
            surface_ratio: 0.7,
        }
    }
}

pub struct TerrainGenerator {
    noise: Simplex,
    params: TerrainParams,
}

impl TerrainGenerator {
    pub fn new(seed: u32, params: TerrainParams) -> Self {
        Self {
            noise: Simplex::new(seed),
            params,
        }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Fractal noise at a column. The third noise axis is pinned to 0.
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let p = &self.params;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut value = 0.0;
        for _ in 0..p.octaves {
            let sx = x / p.scale * frequency;
            let sz = z / p.scale * frequency;
            value += self.noise.get([sx, sz, 0.0]) * amplitude;
            amplitude *= p.persistence;
            frequency *= p.lacunarity;
        }
        value
    }

    /// Surface (grass) height of a column. May fall outside the world, in
    /// which case the column is all dirt or all air.
    pub fn surface_height(&self, x: i32, z: i32, world_height: usize) -> i64 {
        let surface_level = round_half_up(world_height as f64 * self.params.surface_ratio);
        round_half_up(self.sample(x as f64, z as f64) * self.params.height_variance) + surface_level
    }

    /// Overwrite every block of `storage` with generated terrain.
    pub fn fill(&self, storage: &mut VoxelStorage) -> Result<(), VoxelError> {
        let (w, h, d) = storage.dims();
        let mut grass = 0usize;
        for x in 0..w as i32 {
            for z in 0..d as i32 {
                let surface = self.surface_height(x, z, h);
                for y in 0..h as i32 {
                    let block = column_block(y as i64, surface);
                    if block == BlockId::GRASS {
                        grass += 1;
                    }
                    storage.set(BlockPos::new(x, y, z), block)?;
                }
            }
        }
        tracing::debug!("Terrain filled {}x{}x{} ({} grass blocks)", w, h, d, grass);
        Ok(())
    }
}

/// Block at height `y` in a column whose surface is at `surface`.
pub fn column_block(y: i64, surface: i64) -> BlockId {
    if y == surface {
        BlockId::GRASS
    } else if y < surface {
        BlockId::DIRT
    } else {
        BlockId::AIR
    }
}

/// Round to nearest, ties toward positive infinity (so -2.5 -> -2).
fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}
