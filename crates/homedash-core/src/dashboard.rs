// ── Dashboard orchestrator ──
//
// Ties the push connection, the sync store and the command client into one
// handle. Inbound frames flow connection → bridge task → store; writes flow
// command → optimistic entry → HTTP request → rollback on failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use homedash_api::{
    CommandClient, ConnectionManager, ConnectionStatus, Credentials, InboundMessage,
};

use crate::command::{self, Command, CommandResult, PendingWrite};
use crate::config::DashboardConfig;
use crate::error::CoreError;
use crate::model::{DesiredState, EntityKey, Snapshot};
use crate::store::{DashboardView, OptimisticEntry, SyncStore, WriteId};
use crate::stream::ViewStream;

// ── Dashboard ────────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<DashboardInner>`. Owns the push connection,
/// the confirmed snapshot with its optimistic overlay, and the write
/// channel. Dropping the last clone tears down every background task.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    store: Arc<SyncStore>,
    connection: Arc<ConnectionManager>,
    client: CommandClient,
    cancel: CancellationToken,
    /// Child token for the current session; cancelled on stop, replaced
    /// on start.
    session: Mutex<CancellationToken>,
    expiry_running: AtomicBool,
}

impl Drop for DashboardInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Dashboard {
    /// Build a dashboard from configuration. Does NOT connect; call
    /// [`start()`](Self::start) to open the push channel.
    pub fn new(config: DashboardConfig) -> Result<Self, CoreError> {
        let client = CommandClient::new(
            config.api.clone(),
            &config.auth.api_mode(),
            &config.transport(),
        )?;
        let connection = ConnectionManager::new(config.server.clone(), config.reconnect.clone())
            .with_heartbeat_interval(config.heartbeat_interval);
        let store = SyncStore::with_ttl(config.optimistic_ttl);
        let cancel = CancellationToken::new();
        let session = cancel.child_token();

        let dashboard = Self {
            inner: Arc::new(DashboardInner {
                config,
                store: Arc::new(store),
                connection: Arc::new(connection),
                client,
                cancel,
                session: Mutex::new(session),
                expiry_running: AtomicBool::new(false),
            }),
        };
        if tokio::runtime::Handle::try_current().is_ok() {
            dashboard.ensure_expiry_task();
        }
        Ok(dashboard)
    }

    /// Spawn the expiry task once. It lives as long as the dashboard, not
    /// the push session, so entries still expire while stopped.
    fn ensure_expiry_task(&self) {
        if self.inner.expiry_running.swap(true, Ordering::AcqRel) {
            return;
        }
        tokio::spawn(expiry_task(
            Arc::clone(&self.inner.store),
            self.inner.store.watch_deadline(),
            self.inner.cancel.clone(),
        ));
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    fn session(&self) -> MutexGuard<'_, CancellationToken> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the push channel and spawn the inbound bridge. Calling it again
    /// restarts the session. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Internal("dashboard has been shut down".into()));
        }

        let token = {
            let mut session = self.session();
            session.cancel();
            let token = self.inner.cancel.child_token();
            *session = token.clone();
            token
        };

        // Subscribe before starting so the first initial_state is not missed.
        let messages = self.inner.connection.subscribe();
        let status = self.inner.connection.watch_status();
        let credentials = self.inner.config.auth.push_credentials();
        self.inner.connection.start(credentials.clone());

        self.ensure_expiry_task();
        tokio::spawn(bridge_task(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.connection),
            credentials,
            messages,
            status,
            token,
        ));

        info!(server = %self.inner.config.server, "dashboard started");
        Ok(())
    }

    /// Close the push channel. The last snapshot stays visible and is
    /// flagged stale.
    pub fn stop(&self) {
        self.session().cancel();
        self.inner.connection.stop();
        self.inner.store.mark_disconnected();
        debug!("dashboard stopped");
    }

    /// Stop, then forget the snapshot and every pending write. In-flight
    /// writes are abandoned and the dashboard cannot be started again.
    pub fn shutdown(&self) {
        self.stop();
        self.inner.cancel.cancel();
        self.inner.connection.shutdown();
        self.inner.store.clear();
        debug!("dashboard shut down");
    }

    // ── State observation ────────────────────────────────────────────

    /// The current merged view.
    pub fn view(&self) -> Arc<DashboardView> {
        self.inner.store.view()
    }

    /// Subscribe to merged view changes.
    pub fn subscribe(&self) -> ViewStream {
        self.inner.store.subscribe()
    }

    /// The last server-confirmed snapshot, without optimistic overlay.
    pub fn confirmed_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.store.confirmed()
    }

    pub fn pending(&self) -> Vec<OptimisticEntry> {
        self.inner.store.pending()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.view().connection.clone()
    }

    /// Feed one server message through the reducer and tracker, the same
    /// path every inbound frame takes.
    pub fn apply_message(&self, message: &InboundMessage) {
        self.inner.store.apply_message(message, Instant::now());
    }

    /// Drop optimistic entries past their TTL. Returns how many expired.
    pub fn sweep_expired(&self) -> usize {
        self.inner.store.sweep(Instant::now())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Apply a partial light state. The overlay is visible as soon as this
    /// returns.
    pub fn set_light(
        &self,
        light_id: impl Into<String>,
        desired: DesiredState,
    ) -> Result<PendingWrite, CoreError> {
        self.execute(Command::SetLight {
            light_id: light_id.into(),
            desired,
        })
    }

    pub fn toggle_light(
        &self,
        light_id: impl Into<String>,
        on: bool,
    ) -> Result<PendingWrite, CoreError> {
        self.set_light(light_id, DesiredState::power(on))
    }

    /// Switch every light in a room with one bulk request.
    pub fn set_room_power(
        &self,
        room_id: impl Into<String>,
        on: bool,
    ) -> Result<PendingWrite, CoreError> {
        self.execute(Command::SetRoomPower {
            room_id: room_id.into(),
            on,
        })
    }

    /// Switch every light in a zone with one bulk request.
    pub fn set_zone_power(
        &self,
        zone_id: impl Into<String>,
        on: bool,
    ) -> Result<PendingWrite, CoreError> {
        self.execute(Command::SetZonePower {
            zone_id: zone_id.into(),
            on,
        })
    }

    /// Activate a scene. Its effect is overlaid once the server reports
    /// which entities it touched.
    pub fn activate_scene(&self, scene_id: impl Into<String>) -> Result<PendingWrite, CoreError> {
        self.execute(Command::ActivateScene {
            scene_id: scene_id.into(),
        })
    }

    /// Plan and record `command` synchronously, then spawn its HTTP write.
    ///
    /// Fails immediately with `NoSnapshot` or `NotFound`, recording
    /// nothing. Must be called from within a Tokio runtime.
    pub fn execute(&self, command: Command) -> Result<PendingWrite, CoreError> {
        let (write_id, keys) = self
            .inner
            .store
            .record_planned(|snapshot| command::plan::plan(&command, snapshot), Instant::now())?;
        debug!(
            command = command.name(),
            target = command.target_id(),
            entries = keys.len(),
            "write recorded"
        );

        self.ensure_expiry_task();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(write_task(
            Arc::clone(&self.inner.store),
            self.inner.client.clone(),
            command,
            write_id,
            keys,
            self.inner.cancel.clone(),
            tx,
        ));
        Ok(PendingWrite::new(write_id, rx))
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Perform one write and settle its optimistic entries.
async fn write_task(
    store: Arc<SyncStore>,
    client: CommandClient,
    command: Command,
    write_id: WriteId,
    keys: Vec<EntityKey>,
    cancel: CancellationToken,
    result_tx: oneshot::Sender<Result<CommandResult, CoreError>>,
) {
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CoreError::WriteFailed {
            message: "dashboard shut down before the write completed".into(),
        }),
        result = command::execute(&client, &command) => result,
    };

    let outcome = match outcome {
        Ok(affected) => {
            let is_scene = matches!(command, Command::ActivateScene { .. });
            let write_id = if is_scene && !affected.is_empty() {
                // Scene results are overlaid like individual toggles.
                store.record(affected.clone(), Instant::now())
            } else {
                write_id
            };
            debug!(command = command.name(), target = command.target_id(), "write accepted");
            Ok(CommandResult {
                write_id: Some(write_id),
                affected,
            })
        }
        Err(e) => {
            let removed = store.rollback(&keys, write_id, Instant::now());
            warn!(
                command = command.name(),
                target = command.target_id(),
                removed,
                error = %e,
                "write failed, optimistic state rolled back"
            );
            Err(e)
        }
    };

    // The caller may have dropped the handle; the rollback above still ran.
    let _ = result_tx.send(outcome);
}

/// Forward connection status and inbound frames into the store.
async fn bridge_task(
    store: Arc<SyncStore>,
    connection: Arc<ConnectionManager>,
    credentials: Credentials,
    mut messages: broadcast::Receiver<Arc<InboundMessage>>,
    mut status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
) {
    store.set_connection(status.borrow_and_update().clone());

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = status.borrow_and_update().clone();
                if let Some(error) = next.error.as_deref() {
                    warn!(state = ?next.state, error, "push connection changed");
                } else {
                    info!(
                        state = ?next.state,
                        reconnecting = next.is_reconnecting,
                        "push connection changed"
                    );
                }
                store.set_connection(next);
            }
            received = messages.recv() => match received {
                Ok(message) => store.apply_message(&message, Instant::now()),
                Err(RecvError::Lagged(skipped)) => {
                    // Deltas were lost; only a fresh initial_state can
                    // bring the snapshot back in line.
                    warn!(skipped, "inbound bridge lagged, restarting session");
                    connection.start(credentials.clone());
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("inbound bridge stopped");
}

/// Expire optimistic entries at the earliest pending deadline, re-armed
/// whenever the registry changes.
async fn expiry_task(
    store: Arc<SyncStore>,
    mut deadline: watch::Receiver<Option<Instant>>,
    cancel: CancellationToken,
) {
    loop {
        let next = *deadline.borrow_and_update();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = deadline.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            () = sleep_until_deadline(next) => {
                let expired = store.sweep(Instant::now());
                if expired > 0 {
                    debug!(expired, "optimistic writes expired");
                }
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
