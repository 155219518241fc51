//! Mirrors a [`World`] to and from the shared store.
//!
//! Layout in the store:
//!
//! - `world/seed`: the terrain seed
//! - `world/size`: `[width, height, depth]` as three bytes
//! - `world/chunk_{x}_{y}_{z}`: one byte per block, `chunk_size³` long,
//!   indexed `lx + ly·s + lz·s²`
//!
//! Local edits are pushed as whole-chunk read-modify-writes. Remote changes
//! arrive on the store's broadcast channel, are queued by [`WorldSyncService::poll`]
//! and applied together by [`WorldSyncService::apply_remote`] once per tick,
//! so meshes are only ever rebuilt from the tick loop.
//!
//! Writes are fire-and-forget: a failure is logged, counted and reported on
//! the error channel returned by [`WorldSyncService::new`], and the local
//! world keeps going.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use blockworld_engine::world::World;
use blockworld_engine::world::block::BlockId;
use blockworld_engine::world::position::{BlockPos, ChunkPos};
use blockworld_engine::world::storage::VoxelStorage;
use tokio::sync::{broadcast, mpsc};

use crate::error::SyncError;
use crate::metrics::SyncMetrics;
use crate::store::{ChangeSource, ClientId, SharedStore, StoreChange, StoreError, StoreValue, paths};

/// Where a chunk is in its sync lifecycle. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChunkSyncState {
    /// Known only locally.
    Unsynced,
    /// Present in the store (written or read by this client).
    Published,
    /// Remote changes to it are being applied.
    Listening,
}

/// One chunk array received from the store, waiting for the next tick.
#[derive(Debug, Clone)]
pub struct RemoteChunkUpdate {
    pub chunk: ChunkPos,
    pub data: Vec<u8>,
    pub source: ChangeSource,
}

pub struct WorldSyncService {
    store: Arc<dyn SharedStore>,
    source: ChangeSource,
    states: HashMap<ChunkPos, ChunkSyncState>,
    changes: Option<broadcast::Receiver<StoreChange>>,
    listening: bool,
    queue: VecDeque<RemoteChunkUpdate>,
    /// Set when the change channel lagged; every chunk is re-read next tick.
    resync: bool,
    error_tx: mpsc::UnboundedSender<SyncError>,
    metrics: Arc<SyncMetrics>,
}

impl WorldSyncService {
    /// Create the service for one client. The receiver yields every error
    /// from a write that could not be completed.
    pub fn new(
        store: Arc<dyn SharedStore>,
        client: ClientId,
        metrics: Arc<SyncMetrics>,
    ) -> (Self, mpsc::UnboundedReceiver<SyncError>) {
        let (error_tx, error_rx) = mpsc::unbounded_channel();
        let service = Self {
            store,
            source: ChangeSource::Client(client),
            states: HashMap::new(),
            changes: None,
            listening: false,
            queue: VecDeque::new(),
            resync: false,
            error_tx,
            metrics,
        };
        (service, error_rx)
    }

    pub fn source(&self) -> &ChangeSource {
        &self.source
    }

    pub fn metrics(&self) -> &Arc<SyncMetrics> {
        &self.metrics
    }

    pub fn state(&self, chunk: ChunkPos) -> ChunkSyncState {
        self.states.get(&chunk).copied().unwrap_or(ChunkSyncState::Unsynced)
    }

    /// Remote updates waiting for the next [`apply_remote`](Self::apply_remote).
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    // ── Publish / retrieve ──────────────────────────────────────────────

    /// Replace whatever world is in the store with `world`: seed, size and
    /// every chunk array.
    ///
    /// Fails without writing anything if the world is too large for the
    /// size format. Individual write failures go to the error channel.
    pub fn publish(&mut self, world: &World) -> Result<(), SyncError> {
        let storage = world.storage();
        let size = encode_size(storage)?;

        self.report(paths::WORLD, self.store.remove(paths::WORLD, &self.source));
        self.write(paths::SEED, StoreValue::Int(world.seed() as i64));
        self.write(paths::SIZE, StoreValue::Bytes(size));

        let mut published = 0;
        for chunk in storage.chunks() {
            let data = encode_chunk(&storage.chunk_blocks(chunk)?);
            if self.write(&paths::chunk(chunk), StoreValue::Bytes(data)) {
                published += 1;
            }
            self.advance(chunk, ChunkSyncState::Published);
        }
        self.metrics.chunks_published(published);

        // Drop the echoes of our own writes so they cannot overflow the
        // change channel and force a resync.
        if let Some(changes) = self.changes.as_mut() {
            *changes = changes.resubscribe();
        }
        tracing::info!("Published world (seed {}, {} chunks)", world.seed(), published);
        Ok(())
    }

    /// Read the stored world, if any. Meshes are not built.
    ///
    /// `chunk_size` is a client setting; it is not part of the stored
    /// layout. Returns `Ok(None)` when no world has been published. A
    /// missing or malformed chunk fails the whole retrieval.
    pub fn retrieve(&mut self, chunk_size: usize) -> Result<Option<World>, SyncError> {
        let Some(seed) = self.store.get(paths::SEED)? else {
            return Ok(None);
        };
        let seed = seed
            .as_int()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| invalid(paths::SEED, "a 32-bit seed"))?;

        let size = self
            .store
            .get(paths::SIZE)?
            .ok_or_else(|| invalid(paths::SIZE, "present"))?;
        let [width, height, depth] = match size.as_bytes() {
            Some(&[w, h, d]) => [w as usize, h as usize, d as usize],
            _ => return Err(invalid(paths::SIZE, "three size bytes")),
        };

        let mut storage = VoxelStorage::new(width, height, depth, chunk_size)?;
        for chunk in storage.chunks() {
            let key = paths::chunk(chunk);
            let value = self.store.get(&key)?.ok_or(SyncError::MissingChunk(chunk))?;
            let data = value.as_bytes().ok_or_else(|| invalid(&key, "a byte array"))?;
            let blocks = decode_chunk(chunk, data, storage.chunk_volume())?;
            storage.write_chunk(chunk, &blocks)?;
        }

        let count = storage.chunk_count();
        for chunk in storage.chunks() {
            self.advance(chunk, ChunkSyncState::Published);
        }
        self.metrics.chunks_retrieved(count as u64);
        tracing::info!(
            "Retrieved {}x{}x{} world (seed {}, {} chunks)",
            width,
            height,
            depth,
            seed,
            count
        );
        Ok(Some(World::from_storage(seed, storage)))
    }

    // ── Local edits ─────────────────────────────────────────────────────

    /// Propagate the block at `pos` (already set in `world`) to the store by
    /// rewriting its chunk's stored array with that one element changed.
    ///
    /// Pushing the same block twice leaves the stored array as the first
    /// push left it.
    pub fn push_block(&mut self, world: &World, pos: BlockPos) {
        let storage = world.storage();
        let block = match storage.get(pos) {
            Ok(block) => block,
            Err(e) => return self.fail(e.into()),
        };
        let chunk_size = storage.chunk_size();
        let chunk = pos.chunk(chunk_size);
        let key = paths::chunk(chunk);

        let mut data = match self.store.get(&key) {
            Ok(Some(StoreValue::Bytes(data))) => data,
            Ok(Some(_)) => return self.fail(invalid(&key, "a byte array")),
            Ok(None) => return self.fail(SyncError::MissingChunk(chunk)),
            Err(e) => return self.fail(e.into()),
        };
        if data.len() != storage.chunk_volume() {
            return self.fail(SyncError::CorruptChunk {
                chunk,
                expected: storage.chunk_volume(),
                actual: data.len(),
            });
        }

        let index = pos.local(chunk_size).index(chunk_size);
        if data[index] == block.0 {
            tracing::trace!("Block at {:?} already stored", pos);
            return;
        }
        data[index] = block.0;
        if self.write(&key, StoreValue::Bytes(data)) {
            self.metrics.block_pushed();
        }
    }

    // ── Remote changes ──────────────────────────────────────────────────

    /// Start buffering store changes. Idempotent.
    ///
    /// Call before [`retrieve`](Self::retrieve) so nothing written between
    /// the read and [`listen`](Self::listen) is lost.
    pub fn subscribe(&mut self) {
        if self.changes.is_none() {
            self.changes = Some(self.store.subscribe());
        }
    }

    /// Start applying remote changes to every chunk of `world`.
    pub fn listen(&mut self, world: &World) {
        self.subscribe();
        for chunk in world.storage().chunks() {
            self.advance(chunk, ChunkSyncState::Listening);
        }
        self.listening = true;
        tracing::debug!("Listening for remote changes on {} chunks", self.states.len());
    }

    /// Move buffered store changes into the update queue. Own writes and
    /// non-chunk keys are skipped. Returns the number queued.
    pub fn poll(&mut self) -> usize {
        if !self.listening {
            return 0;
        }
        let Some(changes) = self.changes.as_mut() else {
            return 0;
        };

        let mut queued = 0;
        let mut closed = false;
        loop {
            match changes.try_recv() {
                Ok(change) => {
                    if change.source == self.source {
                        continue;
                    }
                    let Some(chunk) = paths::parse_chunk(&change.key) else {
                        continue;
                    };
                    if self.states.get(&chunk) != Some(&ChunkSyncState::Listening) {
                        continue;
                    }
                    match change.value {
                        Some(StoreValue::Bytes(data)) => {
                            self.queue.push_back(RemoteChunkUpdate {
                                chunk,
                                data,
                                source: change.source,
                            });
                            queued += 1;
                        }
                        Some(_) => {
                            let _ = self.error_tx.send(invalid(&change.key, "a byte array"));
                        }
                        // The world was cleared; keep the local copy.
                        None => tracing::debug!("Chunk {:?} removed from store", chunk),
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!("Store change channel lagged by {} messages, resyncing", missed);
                    self.resync = true;
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Closed) => {
                    tracing::warn!("Store change channel closed");
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.changes = None;
        }
        queued
    }

    /// Apply every queued update to `world`, rebuilding each touched chunk
    /// once. Returns the rebuilt chunks in first-touched order.
    ///
    /// A malformed update is reported on the error channel and skipped; the
    /// chunk keeps its previous blocks.
    pub fn apply_remote(&mut self, world: &mut World) -> Vec<ChunkPos> {
        if std::mem::take(&mut self.resync) {
            self.requeue_all(world);
        }

        let volume = world.storage().chunk_volume();
        let mut rebuilt: Vec<ChunkPos> = Vec::new();
        while let Some(update) = self.queue.pop_front() {
            let applied = decode_chunk(update.chunk, &update.data, volume).and_then(|blocks| {
                world
                    .apply_chunk(update.chunk, &blocks)
                    .map_err(SyncError::from)
            });
            match applied {
                Ok(()) => {
                    self.metrics.remote_chunk_applied();
                    if !rebuilt.contains(&update.chunk) {
                        rebuilt.push(update.chunk);
                    }
                }
                Err(e) => self.fail(e),
            }
        }
        if !rebuilt.is_empty() {
            tracing::debug!("Applied remote changes to {} chunks", rebuilt.len());
        }
        rebuilt
    }

    /// [`poll`](Self::poll) then [`apply_remote`](Self::apply_remote).
    pub fn tick(&mut self, world: &mut World) -> Vec<ChunkPos> {
        self.poll();
        self.apply_remote(world)
    }

    /// Drop queued updates and queue the stored copy of every chunk instead.
    fn requeue_all(&mut self, world: &World) {
        self.queue.clear();
        self.metrics.resynced();
        for chunk in world.storage().chunks() {
            match self.store.get(&paths::chunk(chunk)) {
                Ok(Some(StoreValue::Bytes(data))) => self.queue.push_back(RemoteChunkUpdate {
                    chunk,
                    data,
                    source: ChangeSource::Store,
                }),
                Ok(_) => self.fail(SyncError::MissingChunk(chunk)),
                Err(e) => self.fail(e.into()),
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn advance(&mut self, chunk: ChunkPos, state: ChunkSyncState) {
        let current = self.states.entry(chunk).or_insert(ChunkSyncState::Unsynced);
        if state > *current {
            *current = state;
        }
    }

    /// Fire-and-forget write. Returns whether it succeeded.
    fn write(&self, key: &str, value: StoreValue) -> bool {
        self.report(key, self.store.set(key, value, &self.source))
    }

    fn report(&self, key: &str, result: Result<(), StoreError>) -> bool {
        match result {
            Ok(()) => true,
            Err(source) => {
                tracing::warn!("Store write to {} failed: {}", key, source);
                self.metrics.write_failed();
                let _ = self.error_tx.send(SyncError::WriteFailed {
                    key: key.to_string(),
                    source,
                });
                false
            }
        }
    }

    fn fail(&self, error: SyncError) {
        tracing::warn!("Sync error: {}", error);
        let _ = self.error_tx.send(error);
    }
}

fn invalid(key: &str, expected: &'static str) -> SyncError {
    SyncError::InvalidValue {
        key: key.to_string(),
        expected,
    }
}

/// `[width, height, depth]` as bytes.
pub fn encode_size(storage: &VoxelStorage) -> Result<Vec<u8>, SyncError> {
    let (width, height, depth) = storage.dims();
    let too_large = || SyncError::WorldTooLarge { width, height, depth };
    Ok(vec![
        u8::try_from(width).map_err(|_| too_large())?,
        u8::try_from(height).map_err(|_| too_large())?,
        u8::try_from(depth).map_err(|_| too_large())?,
    ])
}

pub fn encode_chunk(blocks: &[BlockId]) -> Vec<u8> {
    blocks.iter().map(|b| b.0).collect()
}

/// Check a stored chunk array's length and map its bytes to block ids.
/// Unknown ids read as air, with one warning per chunk.
pub fn decode_chunk(
    chunk: ChunkPos,
    data: &[u8],
    volume: usize,
) -> Result<Vec<BlockId>, SyncError> {
    if data.len() != volume {
        return Err(SyncError::CorruptChunk {
            chunk,
            expected: volume,
            actual: data.len(),
        });
    }
    let mut unknown = 0usize;
    let blocks: Vec<BlockId> = data
        .iter()
        .map(|&raw| {
            BlockId::checked(raw).unwrap_or_else(|| {
                unknown += 1;
                BlockId::AIR
            })
        })
        .collect();
    if unknown > 0 {
        tracing::warn!(
            "Chunk ({}, {}, {}) holds {} unknown block ids, defaulting to air",
            chunk.x,
            chunk.y,
            chunk.z,
            unknown
        );
    }
    Ok(blocks)
}
