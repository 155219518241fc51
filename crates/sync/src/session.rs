//! One client's view of the shared world.
//!
//! A session joins the store (generating and publishing a world when it is
//! the first player, retrieving the stored one otherwise), registers its
//! presence and character, and is then driven by [`Session::tick`]. Leaving
//! removes the presence; the last player out clears the world.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use blockworld_engine::world::block::BlockId;
use blockworld_engine::world::position::{BlockPos, ChunkPos};
use blockworld_engine::world::{BUILD_DISTANCE, World};
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use crate::store::{ChangeSource, ClientId, SharedStore, StoreValue, paths};
use crate::world_sync::WorldSyncService;

/// Another client appeared in or disappeared from `players`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlayerEvent {
    Joined(ClientId),
    Left(ClientId),
}

/// What one tick changed.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Chunks whose meshes were rebuilt from remote updates.
    pub rebuilt: Vec<ChunkPos>,
    pub players: Vec<PlayerEvent>,
    /// Errors reported since the previous tick.
    pub errors: Vec<SyncError>,
}

pub struct Session {
    client: ClientId,
    source: ChangeSource,
    store: Arc<dyn SharedStore>,
    world: World,
    sync: WorldSyncService,
    error_rx: mpsc::UnboundedReceiver<SyncError>,
    /// Other clients seen in `players` as of the last tick.
    others: BTreeSet<ClientId>,
    /// Position to write on the next tick.
    pending_position: Option<[f32; 3]>,
    metrics: Arc<SyncMetrics>,
}

impl Session {
    pub fn join(
        store: Arc<dyn SharedStore>,
        client: ClientId,
        config: &ClientConfig,
    ) -> Result<Self, SyncError> {
        let metrics = Arc::new(SyncMetrics::new());
        let (mut sync, error_rx) =
            WorldSyncService::new(Arc::clone(&store), client.clone(), Arc::clone(&metrics));
        let source = sync.source().clone();
        sync.subscribe();

        let others: BTreeSet<ClientId> = store
            .children(paths::PLAYERS)?
            .into_iter()
            .filter(|id| *id != client)
            .collect();

        let retrieved = if others.is_empty() {
            None
        } else {
            sync.retrieve(config.world.chunk_size)?
        };
        let mut world = match retrieved {
            Some(world) => world,
            None => {
                let seed = config.seed.unwrap_or_else(|| fastrand::u32(..));
                let world = World::generate(seed, config.world, config.terrain)?;
                sync.publish(&world)?;
                world
            }
        };
        world.build_meshes()?;

        store.set(&paths::player(&client), StoreValue::Text(client.clone()), &source)?;
        store.set(
            &paths::character_position(&client),
            StoreValue::Floats(vec![0.0; 3]),
            &source,
        )?;
        sync.listen(&world);

        tracing::info!("Client {} joined ({} other players)", client, others.len());
        Ok(Self {
            client,
            source,
            store,
            world,
            sync,
            error_rx,
            others,
            pending_position: None,
            metrics,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn sync(&self) -> &WorldSyncService {
        &self.sync
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.metrics
    }

    /// Advance one tick: apply remote chunk updates, write the character
    /// position, diff the player list and collect reported errors.
    pub fn tick(&mut self) -> TickReport {
        let started = Instant::now();
        let mut report = TickReport {
            rebuilt: self.sync.tick(&mut self.world),
            ..TickReport::default()
        };

        if let Some(position) = self.pending_position.take() {
            let key = paths::character_position(&self.client);
            let value = StoreValue::Floats(position.to_vec());
            if let Err(e) = self.store.set(&key, value, &self.source) {
                tracing::warn!("Store write to {} failed: {}", key, e);
                self.metrics.write_failed();
                report.errors.push(SyncError::WriteFailed { key, source: e });
            }
        }

        match self.store.children(paths::PLAYERS) {
            Ok(ids) => {
                let current: BTreeSet<ClientId> =
                    ids.into_iter().filter(|id| *id != self.client).collect();
                for id in current.difference(&self.others) {
                    tracing::info!("Player {} joined", id);
                    report.players.push(PlayerEvent::Joined(id.clone()));
                }
                for id in self.others.difference(&current) {
                    tracing::info!("Player {} left", id);
                    report.players.push(PlayerEvent::Left(id.clone()));
                }
                self.others = current;
            }
            Err(e) => report.errors.push(e.into()),
        }

        while let Ok(error) = self.error_rx.try_recv() {
            report.errors.push(error);
        }
        self.metrics.record_tick(started.elapsed());
        report
    }

    // ── Editing ─────────────────────────────────────────────────────────

    /// Set a block locally, rebuild its chunk and push it to the store.
    pub fn set_block(&mut self, pos: BlockPos, block: BlockId) -> Result<ChunkPos, SyncError> {
        let chunk = self.world.set_block(pos, block)?;
        self.sync.push_block(&self.world, pos);
        Ok(chunk)
    }

    /// Remove the first block within reach along a ray.
    pub fn break_block(
        &mut self,
        origin: [f32; 3],
        direction: [f32; 3],
    ) -> Result<Option<BlockPos>, SyncError> {
        let Some(hit) = self.world.raycast(origin, direction, BUILD_DISTANCE) else {
            return Ok(None);
        };
        self.set_block(hit.block, BlockId::AIR)?;
        Ok(Some(hit.block))
    }

    /// Place `block` in the empty cell in front of the first block within
    /// reach along a ray.
    pub fn place_block(
        &mut self,
        origin: [f32; 3],
        direction: [f32; 3],
        block: BlockId,
    ) -> Result<Option<BlockPos>, SyncError> {
        let Some(target) = self
            .world
            .raycast(origin, direction, BUILD_DISTANCE)
            .and_then(|hit| hit.previous)
        else {
            return Ok(None);
        };
        self.set_block(target, block)?;
        Ok(Some(target))
    }

    // ── Characters ──────────────────────────────────────────────────────

    /// Queue this client's position; written on the next tick.
    pub fn set_character_position(&mut self, position: [f32; 3]) {
        self.pending_position = Some(position);
    }

    /// Other clients as of the last tick, sorted.
    pub fn other_players(&self) -> Vec<ClientId> {
        self.others.iter().cloned().collect()
    }

    pub fn character_position(&self, id: &str) -> Result<Option<[f32; 3]>, SyncError> {
        let key = paths::character_position(id);
        let Some(value) = self.store.get(&key)? else {
            return Ok(None);
        };
        match value.as_floats() {
            Some(&[x, y, z]) => Ok(Some([x, y, z])),
            _ => Err(SyncError::InvalidValue {
                key,
                expected: "three floats",
            }),
        }
    }

    /// Remove this client's presence and character. The last player to
    /// leave clears the world.
    pub fn leave(self) -> Result<(), SyncError> {
        self.store.remove(&paths::player(&self.client), &self.source)?;
        self.store.remove(&paths::character(&self.client), &self.source)?;
        let remaining = self.store.children(paths::PLAYERS)?;
        if remaining.is_empty() {
            self.store.remove(paths::WORLD, &self.source)?;
            tracing::info!("Client {} left; last player, world cleared", self.client);
        } else {
            tracing::info!("Client {} left ({} players remain)", self.client, remaining.len());
        }
        Ok(())
    }
}
