use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use blockworld_engine::world::block::BlockId;
use blockworld_engine::world::World;
use blockworld_sync::config::ClientConfig;
use blockworld_sync::persistence;
use blockworld_sync::session::Session;
use blockworld_sync::store::{MemoryStore, SharedStore};

/// Ticks run when `--ticks` is not given (~2 s at the default rate).
const DEFAULT_TICKS: u64 = 120;

/// Tick of the scripted block placement, and of breaking it again.
const PLACE_TICK: u64 = 10;
const BREAK_TICK: u64 = 20;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".parse().unwrap()),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run()) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path: Option<PathBuf> = std::env::args()
        .skip_while(|a| a != "--config")
        .nth(1)
        .map(Into::into);
    let store_path: Option<PathBuf> = std::env::args()
        .skip_while(|a| a != "--store")
        .nth(1)
        .map(Into::into);
    let ticks: u64 = std::env::args()
        .skip_while(|a| a != "--ticks")
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_TICKS);
    let seed: Option<u32> = std::env::args()
        .skip_while(|a| a != "--seed")
        .nth(1)
        .and_then(|s| s.parse().ok());
    let client = std::env::args()
        .skip_while(|a| a != "--client")
        .nth(1)
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    let stay = std::env::args().any(|a| a == "--stay");

    let mut config = match &config_path {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }

    let store = Arc::new(match &store_path {
        Some(path) => persistence::load_or_default(path)?,
        None => MemoryStore::new(),
    });

    tracing::info!("Blockworld headless client {}", client);
    let shared: Arc<dyn SharedStore> = store.clone();
    let mut session = Session::join(shared, client, &config).context("failed to join")?;
    log_meshes(session.world());

    // ── Tick loop ────────────────────────────────────────────────────────
    let mut interval = tokio::time::interval(config.tick_interval());
    let dims = session.world().dims();
    let (cx, cz) = (dims.width as f32 / 2.0, dims.depth as f32 / 2.0);
    let mut placed = None;

    for tick in 0..ticks {
        interval.tick().await;

        // Walk a small circle around the world centre.
        let angle = tick as f32 * 0.05;
        let eye = [cx + 3.0 * angle.cos(), dims.height as f32 - 1.0, cz + 3.0 * angle.sin()];
        session.set_character_position(eye);

        if tick == PLACE_TICK {
            let origin = surface_eye(session.world(), cx, cz);
            placed = session.place_block(origin, [0.0, -1.0, 0.0], BlockId::STONE)?;
            match placed {
                Some(pos) => tracing::info!("Placed stone at ({}, {}, {})", pos.x, pos.y, pos.z),
                None => tracing::info!("Nothing within reach to place on"),
            }
        }
        if tick == BREAK_TICK {
            if let Some(pos) = placed.take() {
                session.set_block(pos, BlockId::AIR)?;
                tracing::info!("Broke block at ({}, {}, {})", pos.x, pos.y, pos.z);
            }
        }

        let report = session.tick();
        if !report.rebuilt.is_empty() {
            tracing::debug!(
                "Tick {}: {} chunks rebuilt from remote updates",
                tick,
                report.rebuilt.len()
            );
        }
        for event in &report.players {
            tracing::debug!("Tick {}: {:?}", tick, event);
        }
        for error in &report.errors {
            tracing::warn!("Tick {}: {}", tick, error);
        }
    }

    log_meshes(session.world());
    let snapshot = session.metrics().snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => tracing::info!("Metrics: {}", json),
        Err(e) => tracing::warn!("Failed to serialize metrics: {}", e),
    }

    if stay {
        tracing::info!("Keeping presence in the store");
    } else {
        session.leave()?;
    }

    if let Some(path) = &store_path {
        persistence::save_snapshot(&store, path)?;
    }
    Ok(())
}

/// A point just above the terrain at column `(x, z)`, within reach of it.
fn surface_eye(world: &World, x: f32, z: f32) -> [f32; 3] {
    let height = world.dims().height as f32;
    let top = world.raycast([x, height, z], [0.0, -1.0, 0.0], height + 1.0);
    let y = top.map_or(height, |hit| hit.block.y as f32 + 2.0);
    [x, y, z]
}

fn log_meshes(world: &World) {
    let (mut vertices, mut triangles, mut empty) = (0, 0, 0);
    for (_, mesh) in world.meshes() {
        vertices += mesh.vertices.len();
        triangles += mesh.triangle_count();
        if mesh.is_empty() {
            empty += 1;
        }
    }
    tracing::info!(
        "World meshes: {} vertices, {} triangles ({} empty chunks)",
        vertices,
        triangles,
        empty
    );
}
