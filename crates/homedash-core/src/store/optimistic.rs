// ── Optimistic write tracker ──
//
// Registry of writes the client has issued but the server has not yet
// confirmed. Entries are overlaid on every confirmed snapshot until the
// server agrees, the write fails, or the entry times out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::model::{DesiredState, EntityKey, EntityKind, Snapshot, Switchable};

/// Hard ceiling on how long an unconfirmed write stays visible.
pub const OPTIMISTIC_TTL: Duration = Duration::from_secs(15);

/// Identity of one command's batch of entries, used to guard rollback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WriteId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimisticEntry {
    pub key: EntityKey,
    pub desired: DesiredState,
    pub created_at: Instant,
    pub write_id: WriteId,
}

#[derive(Debug)]
pub struct OptimisticTracker {
    entries: HashMap<EntityKey, OptimisticEntry>,
    next_write: u64,
    ttl: Duration,
}

impl Default for OptimisticTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimisticTracker {
    pub fn new() -> Self {
        Self::with_ttl(OPTIMISTIC_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            next_write: 0,
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&OptimisticEntry> {
        self.entries.get(key)
    }

    /// Record one entry. A later write to the same key replaces it.
    pub fn record(&mut self, key: EntityKey, desired: DesiredState, now: Instant) -> WriteId {
        self.record_all([(key, desired)], now)
    }

    /// Record a batch of entries under one write id.
    pub fn record_all(
        &mut self,
        entries: impl IntoIterator<Item = (EntityKey, DesiredState)>,
        now: Instant,
    ) -> WriteId {
        self.next_write += 1;
        let write_id = WriteId(self.next_write);
        for (key, desired) in entries {
            trace!(%key, ?desired, "recording optimistic entry");
            self.entries.insert(
                key.clone(),
                OptimisticEntry {
                    key,
                    desired,
                    created_at: now,
                    write_id,
                },
            );
        }
        write_id
    }

    /// Drop entries older than the TTL. Returns how many were dropped.
    pub fn expire(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let alive = now.saturating_duration_since(entry.created_at) < ttl;
            if !alive {
                debug!(%key, "optimistic entry expired unconfirmed");
            }
            alive
        });
        before - self.entries.len()
    }

    /// Remove entries of a failed write. Entries since overwritten by a
    /// newer write are left alone.
    pub fn rollback(&mut self, keys: &[EntityKey], write_id: WriteId) -> usize {
        let mut removed = 0;
        for key in keys {
            if self
                .entries
                .get(key)
                .is_some_and(|entry| entry.write_id == write_id)
            {
                self.entries.remove(key);
                removed += 1;
            }
        }
        removed
    }

    /// Expire, drop confirmed entries, and overlay the rest onto a copy of
    /// `confirmed`. The confirmed snapshot is never mutated; with nothing
    /// pending it is returned as-is.
    pub fn reconcile(&mut self, confirmed: &Arc<Snapshot>, now: Instant) -> Arc<Snapshot> {
        self.expire(now);
        self.entries.retain(|key, entry| {
            let confirmed_match = entity_matches(confirmed, key, &entry.desired);
            if confirmed_match {
                debug!(%key, "optimistic entry confirmed by server");
            }
            !confirmed_match
        });

        if self.entries.is_empty() {
            return Arc::clone(confirmed);
        }

        let mut merged = Snapshot::clone(confirmed);
        for entry in self.entries.values() {
            overlay(&mut merged, &entry.key, &entry.desired);
        }
        Arc::new(merged)
    }

    /// When the oldest entry runs out, if any are pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .values()
            .map(|entry| entry.created_at + self.ttl)
            .min()
    }

    /// Pending entries, ordered by key.
    pub fn pending(&self) -> Vec<OptimisticEntry> {
        let mut pending: Vec<_> = self.entries.values().cloned().collect();
        pending.sort_by(|a, b| a.key.cmp(&b.key));
        pending
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Entities absent from the snapshot never match, so they stay pending.
fn entity_matches(snapshot: &Snapshot, key: &EntityKey, desired: &DesiredState) -> bool {
    match key.kind {
        EntityKind::Light => snapshot
            .light(&key.id)
            .is_some_and(|(_, light)| desired.matches(light)),
        EntityKind::Room => snapshot.room(&key.id).is_some_and(|r| desired.matches(r)),
        EntityKind::Zone => snapshot.zone(&key.id).is_some_and(|z| desired.matches(z)),
        EntityKind::Summary | EntityKind::MotionZone => false,
    }
}

fn overlay(snapshot: &mut Snapshot, key: &EntityKey, desired: &DesiredState) {
    let target: Option<&mut dyn Switchable> = match key.kind {
        EntityKind::Light => snapshot.light_mut(&key.id).map(|l| l as &mut dyn Switchable),
        EntityKind::Room => snapshot
            .rooms
            .iter_mut()
            .find(|r| r.id == key.id)
            .map(|r| r as &mut dyn Switchable),
        EntityKind::Zone => snapshot
            .zones
            .iter_mut()
            .find(|z| z.id == key.id)
            .map(|z| z as &mut dyn Switchable),
        EntityKind::Summary | EntityKind::MotionZone => None,
    };
    if let Some(entity) = target {
        desired.overlay(entity);
    }
}
