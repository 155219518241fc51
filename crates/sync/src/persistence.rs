//! Store snapshots on disk.
//!
//! A snapshot is the full entry map of a [`MemoryStore`] serialized as JSON
//! and gzip-compressed. Loading a snapshot yields a store with the same
//! entries and no subscribers.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use crate::store::{MemoryStore, StoreValue};

/// Bumped whenever the snapshot layout changes.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    entries: BTreeMap<String, StoreValue>,
}

/// Write every entry of `store` to `path`. Returns the number of entries.
pub fn save_snapshot(store: &MemoryStore, path: &Path) -> Result<usize> {
    let start = Instant::now();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let snapshot = Snapshot {
        version: SNAPSHOT_VERSION,
        entries: store.entries(),
    };
    let count = snapshot.entries.len();

    // Write beside the target, then rename over it.
    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, &snapshot).context("failed to serialize snapshot")?;
    encoder
        .finish()
        .and_then(|mut w| w.flush())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move snapshot to {}", path.display()))?;

    tracing::info!(
        "Saved {} store entries to {} in {:.1}ms",
        count,
        path.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(count)
}

/// Read a snapshot written by [`save_snapshot`].
pub fn load_snapshot(path: &Path) -> Result<MemoryStore> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    let snapshot: Snapshot = serde_json::from_reader(decoder)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        bail!(
            "unsupported snapshot version {} in {} (expected {})",
            snapshot.version,
            path.display(),
            SNAPSHOT_VERSION
        );
    }
    tracing::info!("Loaded {} store entries from {}", snapshot.entries.len(), path.display());
    Ok(MemoryStore::from_entries(snapshot.entries))
}

/// [`load_snapshot`] if the file exists, otherwise an empty store.
pub fn load_or_default(path: &Path) -> Result<MemoryStore> {
    if path.exists() {
        load_snapshot(path)
    } else {
        tracing::info!("No snapshot at {}, starting with an empty store", path.display());
        Ok(MemoryStore::new())
    }
}
