//! Immutable reference snapshots and the TTL'd store that produces them.
//!
//! Matching and validation never query the database directly: they receive an
//! `Arc<ReferenceSnapshot>` by injection, so a request sees one consistent
//! view of the reference dataset and tests can build snapshots in memory.
//! The store re-reads the database when its copy ages out or when an approval
//! invalidates it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing;

use crate::db::repository::reference::get_all_entities;
use crate::db::DatabaseError;
use crate::models::entity::ReferenceEntity;
use crate::models::enums::AttributeCategory;

// ═══════════════════════════════════════════════════════════
// ReferenceSnapshot: one consistent view
// ═══════════════════════════════════════════════════════════

/// Read-only view of the active reference dataset at one point in time.
pub struct ReferenceSnapshot {
    by_category: HashMap<AttributeCategory, Vec<ReferenceEntity>>,
    loaded_at: DateTime<Utc>,
}

impl ReferenceSnapshot {
    /// Build a snapshot from in-memory entities. Entities are ordered by id
    /// within each category; the fuzzy tie-break depends on that order.
    pub fn from_entities(
        mut by_category: HashMap<AttributeCategory, Vec<ReferenceEntity>>,
    ) -> Self {
        for entities in by_category.values_mut() {
            entities.sort_by_key(|e| e.id);
        }
        Self {
            by_category,
            loaded_at: Utc::now(),
        }
    }

    /// Load the current active dataset from the store.
    pub fn load(conn: &Connection) -> Result<Self, DatabaseError> {
        Ok(Self::from_entities(get_all_entities(conn)?))
    }

    pub fn entities(&self, category: AttributeCategory) -> &[ReferenceEntity] {
        self.by_category
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn find(&self, category: AttributeCategory, entity_id: i64) -> Option<&ReferenceEntity> {
        self.entities(category).iter().find(|e| e.id == entity_id)
    }

    pub fn counts(&self) -> BTreeMap<AttributeCategory, usize> {
        AttributeCategory::ALL
            .iter()
            .map(|c| (*c, self.entities(*c).len()))
            .collect()
    }

    pub fn total(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

// ═══════════════════════════════════════════════════════════
// SnapshotStore: TTL cache with explicit invalidation
// ═══════════════════════════════════════════════════════════

/// Bounded read cache in front of the reference dataset.
///
/// Key properties:
/// - `snapshot()` serves the cached `Arc` while it is younger than the TTL
/// - `invalidate()` drops the cached copy so the next access reloads;
///   called synchronously after every successful approval
/// - concurrent readers share one `Arc`; a reload never mutates a snapshot
///   another request is still holding
pub struct SnapshotStore {
    ttl: Duration,
    state: RwLock<Option<CachedSnapshot>>,
}

struct CachedSnapshot {
    snapshot: Arc<ReferenceSnapshot>,
    fetched_at: Instant,
}

impl SnapshotStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(None),
        }
    }

    /// Current snapshot, reloading from the store if the cache is cold,
    /// stale, or invalidated.
    pub fn snapshot(&self, conn: &Connection) -> Result<Arc<ReferenceSnapshot>, DatabaseError> {
        {
            let state = read_lock(&self.state);
            if let Some(cached) = state.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&cached.snapshot));
                }
            }
        }
        self.reload(conn)
    }

    /// Force a fresh load now.
    pub fn reload(&self, conn: &Connection) -> Result<Arc<ReferenceSnapshot>, DatabaseError> {
        let snapshot = Arc::new(ReferenceSnapshot::load(conn)?);
        tracing::debug!(entities = snapshot.total(), "Reference snapshot reloaded");
        let mut state = write_lock(&self.state);
        *state = Some(CachedSnapshot {
            snapshot: Arc::clone(&snapshot),
            fetched_at: Instant::now(),
        });
        Ok(snapshot)
    }

    /// Drop the cached copy so the next `snapshot()` call reloads.
    pub fn invalidate(&self) {
        let mut state = write_lock(&self.state);
        *state = None;
    }

    pub fn status(&self) -> SnapshotStatus {
        let state = read_lock(&self.state);
        match state.as_ref() {
            Some(cached) => SnapshotStatus {
                loaded: true,
                age: Some(cached.fetched_at.elapsed()),
                total_entities: cached.snapshot.total(),
                counts: cached.snapshot.counts(),
            },
            None => SnapshotStatus {
                loaded: false,
                age: None,
                total_entities: 0,
                counts: BTreeMap::new(),
            },
        }
    }
}

#[derive(Debug)]
pub struct SnapshotStatus {
    pub loaded: bool,
    pub age: Option<Duration>,
    pub total_entities: usize,
    pub counts: BTreeMap<AttributeCategory, usize>,
}

// A poisoned lock only means another thread panicked mid-read; the cache
// state itself is always a consistent Option, so keep serving it.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
