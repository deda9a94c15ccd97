//! Shared deduplication registry: exactly-once insert of block fingerprints
//! across concurrent scan workers.

use crate::fingerprint::Fingerprint;
use dashmap::DashSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::trace;

/// Set of fingerprints already seen during one scan run.
///
/// Object-safe and sync-capable so one instance can be shared by every worker.
pub trait DedupRegistry: Send + Sync {
    /// Atomically check for and insert `fp`.
    /// Returns true if this call inserted it (first sighting), false if it was already present.
    fn observe(&self, fp: Fingerprint) -> bool;

    /// Number of distinct fingerprints observed.
    fn len(&self) -> usize;

    /// True if nothing has been observed yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all fingerprints, sorted.
    fn fingerprints(&self) -> Vec<Fingerprint>;
}

/// Registry guarded by a single mutex. The lock covers only the set insert.
#[derive(Debug, Default)]
pub struct LockedRegistry {
    seen: Mutex<HashSet<Fingerprint>>,
}

impl LockedRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupRegistry for LockedRegistry {
    fn observe(&self, fp: Fingerprint) -> bool {
        let inserted = self.seen.lock().insert(fp);
        trace!(fingerprint = %fp, inserted, "observe");
        inserted
    }

    fn len(&self) -> usize {
        self.seen.lock().len()
    }

    fn fingerprints(&self) -> Vec<Fingerprint> {
        let mut all: Vec<Fingerprint> = self.seen.lock().iter().copied().collect();
        all.sort_unstable();
        all
    }
}

/// Registry backed by a sharded concurrent set; workers only contend when
/// their fingerprints land in the same shard.
#[derive(Debug, Default)]
pub struct ShardedRegistry {
    seen: DashSet<Fingerprint>,
}

impl ShardedRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupRegistry for ShardedRegistry {
    fn observe(&self, fp: Fingerprint) -> bool {
        let inserted = self.seen.insert(fp);
        trace!(fingerprint = %fp, inserted, "observe");
        inserted
    }

    fn len(&self) -> usize {
        self.seen.len()
    }

    fn fingerprints(&self) -> Vec<Fingerprint> {
        let mut all: Vec<Fingerprint> = self.seen.iter().map(|fp| *fp.key()).collect();
        all.sort_unstable();
        all
    }
}

/// Registry implementation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    /// [`LockedRegistry`]
    Locked,
    /// [`ShardedRegistry`]
    #[default]
    Sharded,
}

impl RegistryKind {
    /// Build an empty registry of this kind
    pub fn build(&self) -> Box<dyn DedupRegistry> {
        match self {
            Self::Locked => Box::new(LockedRegistry::new()),
            Self::Sharded => Box::new(ShardedRegistry::new()),
        }
    }
}

impl std::fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "locked"),
            Self::Sharded => write!(f, "sharded"),
        }
    }
}
