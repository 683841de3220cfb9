//! Per-source seen-set tracking.
//!
//! A [`Deduplicator`] is owned by one poll loop. Items are marked only after
//! their task record has been written, so a failed write leaves the item
//! eligible on the next tick. Without an attached [`SeenStore`] the set is
//! forgotten on restart; sources that need cross-restart suppression either
//! attach a store or rely on remote state (mail read flags).

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::models::ItemId;
use crate::{AppError, Result};

/// Identifiers reported by a source on one listing.
pub type ItemSet = BTreeSet<ItemId>;

/// Durable snapshot of a seen-set.
pub trait SeenStore: Send + Sync {
    /// Load the persisted identifiers; `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing snapshot cannot be read or parsed.
    fn load(&self) -> Result<Option<HashSet<ItemId>>>;

    /// Replace the persisted snapshot with `seen`.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written.
    fn save(&self, seen: &HashSet<ItemId>) -> Result<()>;
}

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    ids: BTreeSet<ItemId>,
}

/// JSON file implementation of [`SeenStore`], replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonSeenStore {
    path: PathBuf,
}

impl JsonSeenStore {
    /// Store snapshots at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Snapshot file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SeenStore for JsonSeenStore {
    fn load(&self) -> Result<Option<HashSet<ItemId>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(AppError::Config(format!(
                "unsupported seen-set snapshot version {}",
                snapshot.version
            )));
        }
        Ok(Some(snapshot.ids.into_iter().collect()))
    }

    fn save(&self, seen: &HashSet<ItemId>) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| AppError::Io("snapshot path has no parent directory".into()))?;
        fs::create_dir_all(parent)?;

        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            ids: seen.iter().cloned().collect(),
        };
        let mut tmp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut tmp, &snapshot)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|err| AppError::Io(format!("failed to persist snapshot: {}", err.error)))?;
        Ok(())
    }
}

/// Items present in `current` but not in `seen`.
#[must_use]
pub fn diff(current: &ItemSet, seen: &HashSet<ItemId>) -> Vec<ItemId> {
    current
        .iter()
        .filter(|id| !seen.contains(*id))
        .cloned()
        .collect()
}

/// Seen-set owned by a single poll loop.
#[derive(Default)]
pub struct Deduplicator {
    seen: HashSet<ItemId>,
    store: Option<Box<dyn SeenStore>>,
    restored: bool,
}

impl std::fmt::Debug for Deduplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deduplicator")
            .field("seen", &self.seen.len())
            .field("persistent", &self.store.is_some())
            .field("restored", &self.restored)
            .finish()
    }
}

impl Deduplicator {
    /// Empty, memory-only seen-set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a durable store and hydrate from it.
    ///
    /// A snapshot that fails to load is logged and treated as absent.
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn SeenStore>) -> Self {
        match store.load() {
            Ok(Some(ids)) => {
                info!(count = ids.len(), "hydrated seen-set from snapshot");
                self.seen.extend(ids);
                self.restored = true;
            }
            Ok(None) => info!("no seen-set snapshot yet, starting empty"),
            Err(err) => warn!(%err, "failed to load seen-set snapshot, starting empty"),
        }
        self.store = Some(store);
        self
    }

    /// Whether a durable store is attached.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Whether the set was hydrated from an existing snapshot. Restored sets
    /// are never seeded from a listing.
    #[must_use]
    pub fn is_restored(&self) -> bool {
        self.restored
    }

    /// Treat every id in `ids` as already processed.
    pub fn seed<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = ItemId>,
    {
        self.seen.extend(ids);
        self.persist();
    }

    /// New ids in `current`, in sorted order.
    #[must_use]
    pub fn diff(&self, current: &ItemSet) -> Vec<ItemId> {
        diff(current, &self.seen)
    }

    /// Record a successfully materialized id.
    pub fn mark(&mut self, id: ItemId) {
        if self.seen.insert(id) {
            self.persist();
        }
    }

    /// Whether `id` has already produced a task.
    #[must_use]
    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of ids recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(err) = store.save(&self.seen) {
                warn!(%err, "failed to persist seen-set snapshot");
            }
        }
    }
}
