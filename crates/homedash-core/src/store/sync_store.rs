// ── Synchronized state store ──
//
// Owns the confirmed snapshot, the optimistic registry and the connection
// status, and publishes the merged `DashboardView` on every change. All
// mutation happens under one short-lived mutex that is never held across
// an `.await`, so every transition is atomic with respect to the others.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use homedash_api::{ConnectionState, ConnectionStatus, InboundMessage};

use super::optimistic::{OptimisticEntry, OptimisticTracker, WriteId};
use crate::convert;
use crate::error::CoreError;
use crate::model::{DesiredState, EntityKey, Snapshot};
use crate::reducer::{self, Update};
use crate::stream::ViewStream;

/// Everything a dashboard renders, as one consistent value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    /// Confirmed state with pending writes overlaid. `None` until the
    /// first full state arrives.
    pub snapshot: Option<Arc<Snapshot>>,
    pub pending: Vec<OptimisticEntry>,
    pub connection: ConnectionStatus,
    /// A snapshot is shown but the push channel is not open.
    pub stale: bool,
    pub last_server_error: Option<String>,
}

impl DashboardView {
    pub fn is_pending(&self, key: &EntityKey) -> bool {
        self.pending.iter().any(|entry| entry.key == *key)
    }
}

struct SyncState {
    confirmed: Option<Arc<Snapshot>>,
    merged: Option<Arc<Snapshot>>,
    tracker: OptimisticTracker,
    connection: ConnectionStatus,
    last_server_error: Option<String>,
}

impl SyncState {
    fn remerge(&mut self, now: Instant) {
        self.merged = self
            .confirmed
            .as_ref()
            .map(|confirmed| self.tracker.reconcile(confirmed, now));
    }

    fn view(&self) -> DashboardView {
        DashboardView {
            snapshot: self.merged.clone(),
            pending: self.tracker.pending(),
            connection: self.connection.clone(),
            stale: self.merged.is_some() && !self.connection.is_connected,
            last_server_error: self.last_server_error.clone(),
        }
    }
}

pub struct SyncStore {
    state: Mutex<SyncState>,
    view_tx: watch::Sender<Arc<DashboardView>>,
    /// Earliest moment a pending entry runs out.
    deadline_tx: watch::Sender<Option<Instant>>,
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStore {
    pub fn new() -> Self {
        Self::with_tracker(OptimisticTracker::new())
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_tracker(OptimisticTracker::with_ttl(ttl))
    }

    fn with_tracker(tracker: OptimisticTracker) -> Self {
        let (view_tx, _) = watch::channel(Arc::new(DashboardView::default()));
        let (deadline_tx, _) = watch::channel(None);
        Self {
            state: Mutex::new(SyncState {
                confirmed: None,
                merged: None,
                tracker,
                connection: ConnectionStatus::default(),
                last_server_error: None,
            }),
            view_tx,
            deadline_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SyncState) {
        self.view_tx.send_replace(Arc::new(state.view()));
        let deadline = state.tracker.next_deadline();
        self.deadline_tx.send_if_modified(|current| {
            let changed = *current != deadline;
            *current = deadline;
            changed
        });
    }

    /// Expire anything already past its deadline before a read, so readers
    /// never see an entry older than the TTL.
    fn expire_due(&self) {
        let mut state = self.lock();
        let now = Instant::now();
        if state.tracker.expire(now) > 0 {
            state.remerge(now);
            self.publish(&state);
        }
    }

    // ── Inbound ──────────────────────────────────────────────────────

    /// Route one server message. `error` frames are surfaced in the view;
    /// `pong` is ignored.
    pub fn apply_message(&self, message: &InboundMessage, now: Instant) {
        match message {
            InboundMessage::Error { message } => {
                warn!(%message, "server reported an error");
                self.set_server_error(message.clone());
            }
            InboundMessage::Pong {} => {}
            InboundMessage::InitialState { .. } | InboundMessage::StateUpdate { .. } => {
                if let Some(update) = convert::update_from_message(message) {
                    self.apply_update(&update, now);
                }
            }
        }
    }

    /// Run the reducer, then reconcile pending writes against the result.
    /// Returns `false` if the update was dropped.
    pub fn apply_update(&self, update: &Update, now: Instant) -> bool {
        let mut state = self.lock();
        let Some(next) = reducer::reduce(state.confirmed.as_ref(), update) else {
            return false;
        };
        if matches!(update, Update::Replace(_)) {
            debug!("full state received");
            state.last_server_error = None;
        }
        state.confirmed = Some(next);
        state.remerge(now);
        self.publish(&state);
        true
    }

    pub fn set_server_error(&self, message: String) {
        let mut state = self.lock();
        state.last_server_error = Some(message);
        self.publish(&state);
    }

    pub fn set_connection(&self, status: ConnectionStatus) {
        let mut state = self.lock();
        if state.connection == status {
            return;
        }
        state.connection = status;
        self.publish(&state);
    }

    /// Force the status to disconnected without waiting for the connection
    /// manager to report it.
    pub fn mark_disconnected(&self) {
        let mut state = self.lock();
        state.connection.state = ConnectionState::Disconnected;
        state.connection.is_connected = false;
        state.connection.is_reconnecting = false;
        self.publish(&state);
    }

    // ── Optimistic writes ────────────────────────────────────────────

    /// Resolve a write against the confirmed snapshot and record its
    /// entries in one step. Nothing is recorded if `plan` fails.
    pub fn record_planned<F>(&self, plan: F, now: Instant) -> Result<(WriteId, Vec<EntityKey>), CoreError>
    where
        F: FnOnce(&Snapshot) -> Result<Vec<(EntityKey, DesiredState)>, CoreError>,
    {
        let mut state = self.lock();
        let confirmed = state.confirmed.clone().ok_or(CoreError::NoSnapshot)?;
        let entries = plan(confirmed.as_ref())?;
        let keys = entries.iter().map(|(key, _)| key.clone()).collect();
        let write_id = state.tracker.record_all(entries, now);
        state.remerge(now);
        self.publish(&state);
        Ok((write_id, keys))
    }

    /// Record entries the server reported back (scene activation).
    pub fn record(&self, entries: Vec<(EntityKey, DesiredState)>, now: Instant) -> WriteId {
        let mut state = self.lock();
        let write_id = state.tracker.record_all(entries, now);
        state.remerge(now);
        self.publish(&state);
        write_id
    }

    pub fn rollback(&self, keys: &[EntityKey], write_id: WriteId, now: Instant) -> usize {
        let mut state = self.lock();
        let removed = state.tracker.rollback(keys, write_id);
        if removed > 0 {
            debug!(removed, "rolled back failed write");
            state.remerge(now);
            self.publish(&state);
        }
        removed
    }

    /// Drop expired entries and republish if anything changed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut state = self.lock();
        let expired = state.tracker.expire(now);
        if expired > 0 {
            state.remerge(now);
            self.publish(&state);
        }
        expired
    }

    /// Forget the snapshot and every pending write.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.confirmed = None;
        state.merged = None;
        state.tracker.clear();
        state.last_server_error = None;
        self.publish(&state);
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn view(&self) -> Arc<DashboardView> {
        self.expire_due();
        self.view_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> ViewStream {
        ViewStream::new(self.view_tx.subscribe())
    }

    pub fn confirmed(&self) -> Option<Arc<Snapshot>> {
        self.lock().confirmed.clone()
    }

    pub fn pending(&self) -> Vec<OptimisticEntry> {
        self.expire_due();
        self.lock().tracker.pending()
    }

    /// Watch the earliest pending deadline; drives the expiry task.
    pub fn watch_deadline(&self) -> watch::Receiver<Option<Instant>> {
        self.deadline_tx.subscribe()
    }
}
