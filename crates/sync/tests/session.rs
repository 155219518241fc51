//! Join/leave lifecycle, edit propagation and presence between sessions.

use std::sync::Arc;

use blockworld_engine::terrain::TerrainParams;
use blockworld_engine::world::WorldDims;
use blockworld_engine::world::block::BlockId;
use blockworld_engine::world::position::BlockPos;
use blockworld_sync::config::ClientConfig;
use blockworld_sync::session::{PlayerEvent, Session};
use blockworld_sync::store::{
    CHANGE_CAPACITY, ChangeSource, MemoryStore, SharedStore, StoreValue, paths,
};

// ---- Helpers ----

fn config(seed: u32) -> ClientConfig {
    ClientConfig {
        world: WorldDims {
            width: 16,
            height: 16,
            depth: 16,
            chunk_size: 8,
        },
        // Flat: grass at y = 11.
        terrain: TerrainParams {
            octaves: 0,
            ..TerrainParams::default()
        },
        seed: Some(seed),
        ..ClientConfig::default()
    }
}

/// 20 x 4 x 16 chunks, more than the change channel holds.
fn large_config(seed: u32) -> ClientConfig {
    ClientConfig {
        world: WorldDims {
            width: 80,
            height: 16,
            depth: 64,
            chunk_size: 4,
        },
        ..config(seed)
    }
}

fn join(store: &Arc<MemoryStore>, id: &str, seed: u32) -> Session {
    let shared: Arc<dyn SharedStore> = store.clone();
    Session::join(shared, id.to_string(), &config(seed)).unwrap()
}

// ---- Join ----

#[test]
fn first_client_generates_and_publishes() {
    let store = Arc::new(MemoryStore::new());
    let a = join(&store, "a", 7);

    assert_eq!(a.world().seed(), 7);
    assert_eq!(store.get(paths::SEED).unwrap(), Some(StoreValue::Int(7)));
    assert_eq!(store.children(paths::PLAYERS).unwrap(), vec!["a".to_string()]);
    assert_eq!(a.character_position("a").unwrap(), Some([0.0, 0.0, 0.0]));
    assert!(a.world().meshes().any(|(_, m)| !m.is_empty()));
    assert!(a.other_players().is_empty());
}

#[test]
fn second_client_retrieves_the_shared_world() {
    let store = Arc::new(MemoryStore::new());
    let a = join(&store, "a", 7);
    // A different configured seed must not matter once a world exists.
    let b = join(&store, "b", 99);

    assert_eq!(b.world().seed(), 7);
    assert_eq!(b.world().storage(), a.world().storage());
    assert_eq!(b.other_players(), vec!["a".to_string()]);
    assert_eq!(b.sync().metrics().snapshot().chunks_retrieved, 8);
    assert_eq!(b.sync().metrics().snapshot().chunks_published, 0);
}

#[test]
fn players_without_a_world_fall_back_to_generation() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(&paths::player("ghost"), StoreValue::Text("ghost".into()), &ChangeSource::Store)
        .unwrap();

    let a = join(&store, "a", 3);
    assert_eq!(a.world().seed(), 3);
    assert_eq!(store.get(paths::SEED).unwrap(), Some(StoreValue::Int(3)));
    assert_eq!(a.other_players(), vec!["ghost".to_string()]);
}

// ---- Editing ----

#[test]
fn edits_propagate_on_the_next_tick() {
    let store = Arc::new(MemoryStore::new());
    let mut a = join(&store, "a", 7);
    let mut b = join(&store, "b", 7);

    let pos = BlockPos::new(3, 12, 3);
    let chunk = a.set_block(pos, BlockId::STONE).unwrap();
    assert_eq!(b.world().get_block(pos).unwrap(), BlockId::AIR);

    let report = b.tick();
    assert_eq!(report.rebuilt, vec![chunk]);
    assert!(report.errors.is_empty());
    assert_eq!(b.world().get_block(pos).unwrap(), BlockId::STONE);
    assert_eq!(b.world().mesh(chunk), a.world().mesh(chunk));

    // The editor does not re-apply its own write.
    assert!(a.tick().rebuilt.is_empty());
}

#[test]
fn out_of_bounds_edit_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let mut a = join(&store, "a", 7);
    let before = store.entries();
    assert!(a.set_block(BlockPos::new(16, 0, 0), BlockId::STONE).is_err());
    assert_eq!(store.entries(), before);
}

#[test]
fn place_and_break_along_a_ray() {
    let store = Arc::new(MemoryStore::new());
    let mut a = join(&store, "a", 7);
    let down = [0.0, -1.0, 0.0];

    let placed = a.place_block([4.0, 13.0, 4.0], down, BlockId::BANDED_IRON).unwrap();
    assert_eq!(placed, Some(BlockPos::new(4, 12, 4)));
    assert_eq!(a.world().get_block(BlockPos::new(4, 12, 4)).unwrap(), BlockId::BANDED_IRON);

    let broken = a.break_block([4.0, 13.0, 4.0], down).unwrap();
    assert_eq!(broken, Some(BlockPos::new(4, 12, 4)));
    assert!(a.world().get_block(BlockPos::new(4, 12, 4)).unwrap().is_air());

    // Nothing within reach straight up.
    assert_eq!(a.break_block([4.0, 13.0, 4.0], [0.0, 1.0, 0.0]).unwrap(), None);
}

// ---- Players and characters ----

#[test]
fn player_joins_and_leaves_are_reported() {
    let store = Arc::new(MemoryStore::new());
    let mut a = join(&store, "a", 7);
    let b = join(&store, "b", 7);

    assert_eq!(a.tick().players, vec![PlayerEvent::Joined("b".into())]);
    assert!(a.tick().players.is_empty());

    b.leave().unwrap();
    assert_eq!(a.tick().players, vec![PlayerEvent::Left("b".into())]);
    assert!(a.other_players().is_empty());
}

#[test]
fn character_position_is_written_on_tick() {
    let store = Arc::new(MemoryStore::new());
    let mut a = join(&store, "a", 7);
    let b = join(&store, "b", 7);

    a.set_character_position([1.5, 12.0, -2.0]);
    assert_eq!(b.character_position("a").unwrap(), Some([0.0, 0.0, 0.0]));
    a.tick();
    assert_eq!(b.character_position("a").unwrap(), Some([1.5, 12.0, -2.0]));
    assert_eq!(b.character_position("nobody").unwrap(), None);
}

// ---- Leave ----

#[test]
fn last_player_to_leave_clears_the_world() {
    let store = Arc::new(MemoryStore::new());
    let a = join(&store, "a", 7);
    let b = join(&store, "b", 7);

    a.leave().unwrap();
    assert!(store.get(paths::SEED).unwrap().is_some());
    assert_eq!(store.get(&paths::character_position("a")).unwrap(), None);

    b.leave().unwrap();
    assert!(store.is_empty());
}

#[test]
fn rejoining_an_empty_store_generates_a_new_world() {
    let store = Arc::new(MemoryStore::new());
    join(&store, "a", 7).leave().unwrap();

    let c = join(&store, "c", 8);
    assert_eq!(c.world().seed(), 8);
    assert_eq!(store.get(paths::SEED).unwrap(), Some(StoreValue::Int(8)));
}

// ---- Large worlds ----

#[test]
fn lone_client_does_not_resync_its_own_publish() {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn SharedStore> = store.clone();
    let mut a = Session::join(shared, "a".into(), &large_config(7)).unwrap();
    assert!(a.world().storage().chunk_count() > CHANGE_CAPACITY);

    let report = a.tick();
    assert!(report.rebuilt.is_empty());
    assert!(report.errors.is_empty());
    let metrics = a.metrics().snapshot();
    assert_eq!(metrics.resyncs, 0);
    assert_eq!(metrics.remote_chunks_applied, 0);
}

#[test]
fn republishing_over_a_stale_world_does_not_resync() {
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn SharedStore> = store.clone();
    let old = Session::join(shared, "old".into(), &large_config(7)).unwrap();
    // The world outlives its players when presence is dropped without leaving.
    store.remove(&paths::player("old"), &ChangeSource::Store).unwrap();
    drop(old);

    let shared: Arc<dyn SharedStore> = store.clone();
    let mut a = Session::join(shared, "a".into(), &large_config(8)).unwrap();
    assert_eq!(a.world().seed(), 8);
    assert_eq!(store.get(paths::SEED).unwrap(), Some(StoreValue::Int(8)));
    assert!(a.tick().rebuilt.is_empty());
    assert_eq!(a.metrics().snapshot().resyncs, 0);
}
