//! Long-lived background scope hosting the sync listeners.

use crate::applier::RemoteApplier;
use crate::config::SyncConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::SyncCoordinator;
use crate::error::{SyncError, SyncResult};
use crate::ledger::PendingLedger;
use crate::realtime::RealtimeManager;
use crate::remote::{RealtimeSource, RemoteApi, Session};
use crate::repository::EntityRepository;
use parking_lot::{Mutex, RwLock};
use plansync_model::EntityType;
use plansync_store::LocalStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

type SharedSession = Arc<RwLock<Option<Session>>>;

/// Wires the ledger, coordinator and realtime feed into one background scope.
///
/// Background failures are logged and left in the ledger for the next pass;
/// none of them reach UI callers.
pub struct SyncService {
    store: Arc<LocalStore>,
    ledger: Arc<PendingLedger>,
    applier: Arc<RemoteApplier>,
    coordinator: Arc<SyncCoordinator>,
    realtime: RealtimeManager,
    connectivity: ConnectivityMonitor,
    session: SharedSession,
    shutdown: CancellationToken,
    triggers: Mutex<Option<mpsc::UnboundedReceiver<EntityType>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncService {
    /// Builds the service. Nothing runs until [`start`](Self::start).
    pub fn new(
        config: SyncConfig,
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteApi>,
        source: Arc<dyn RealtimeSource>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let ledger = Arc::new(PendingLedger::new(store.clone(), connectivity.clone()));
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        ledger.set_trigger(trigger_tx);

        let applier = Arc::new(RemoteApplier::new(store.clone(), config.conflict_policy));
        let realtime =
            RealtimeManager::new(source, applier.clone(), &config, shutdown.child_token());
        let coordinator = Arc::new(SyncCoordinator::new(
            config,
            store.clone(),
            ledger.clone(),
            remote,
            applier.clone(),
            connectivity.clone(),
        ));

        Self {
            store,
            ledger,
            applier,
            coordinator,
            realtime,
            connectivity,
            session: Arc::new(RwLock::new(None)),
            shutdown,
            triggers: Mutex::new(Some(trigger_rx)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the connectivity and trigger listeners.
    ///
    /// Must be called from within a tokio runtime, and only once.
    pub fn start(&self) -> SyncResult<()> {
        let Some(triggers) = self.triggers.lock().take() else {
            return Err(SyncError::InvalidStateTransition {
                from: "started".into(),
                to: "start".into(),
            });
        };
        if self.shutdown.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let connectivity_task = tokio::spawn(watch_connectivity(
            self.connectivity.subscribe(),
            self.coordinator.clone(),
            self.session.clone(),
            self.shutdown.clone(),
        ));
        let trigger_task = tokio::spawn(drain_triggers(
            triggers,
            self.coordinator.clone(),
            self.connectivity.clone(),
            self.session.clone(),
            self.shutdown.clone(),
        ));
        self.tasks.lock().extend([connectivity_task, trigger_task]);
        info!("sync service started");
        Ok(())
    }

    /// Runs the post-login sequence: full refresh, realtime subscribe, then a
    /// push pass. Failures are logged.
    pub async fn on_authenticated(&self, session: Session) {
        let user_id = session.user_id.clone();
        *self.session.write() = Some(session);
        info!(user_id = %user_id, "session started");

        if let Err(e) = self.coordinator.refresh_from_remote(&user_id).await {
            warn!(user_id = %user_id, error = %e, "refresh after login failed");
        }
        if let Err(e) = self.realtime.subscribe(&user_id).await {
            warn!(user_id = %user_id, error = %e, "realtime subscribe after login failed");
        }
        if let Err(e) = self.coordinator.sync_all().await {
            warn!(user_id = %user_id, error = %e, "sync pass after login failed");
        }
    }

    /// Drops the session and stops the realtime listeners. Pushes already in
    /// flight run to completion.
    pub async fn on_logout(&self) {
        let previous = self.session.write().take();
        self.realtime.unsubscribe().await;
        if let Some(session) = previous {
            info!(user_id = %session.user_id, "session ended");
        }
    }

    /// Cancels every background task and waits for them to stop.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.realtime.unsubscribe().await;
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!(error = %e, "sync task panicked");
            }
        }
        info!("sync service stopped");
    }

    /// Returns true while a session is attached.
    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_some()
    }

    /// The current session.
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Repository writing through this service's ledger.
    pub fn repository(&self) -> EntityRepository {
        EntityRepository::new(self.store.clone(), self.ledger.clone())
    }

    /// The coordinator.
    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    /// The ledger.
    pub fn ledger(&self) -> &Arc<PendingLedger> {
        &self.ledger
    }

    /// The remote applier.
    pub fn applier(&self) -> &Arc<RemoteApplier> {
        &self.applier
    }

    /// The realtime manager.
    pub fn realtime(&self) -> &RealtimeManager {
        &self.realtime
    }

    /// The connectivity monitor.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// The local store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("authenticated", &self.is_authenticated())
            .field("online", &self.connectivity.is_online())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

async fn watch_connectivity(
    mut online: watch::Receiver<bool>,
    coordinator: Arc<SyncCoordinator>,
    session: SharedSession,
    shutdown: CancellationToken,
) {
    let mut was_online = *online.borrow_and_update();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = online.changed() => {
                if changed.is_err() {
                    break;
                }
                let now_online = *online.borrow_and_update();
                if now_online && !was_online {
                    let signed_in = session.read().is_some();
                    if signed_in {
                        info!("connectivity restored, running sync pass");
                        if let Err(e) = coordinator.sync_all().await {
                            warn!(error = %e, "sync pass after reconnect failed");
                        }
                    } else {
                        debug!("connectivity restored without a session");
                    }
                } else if !now_online {
                    debug!("connectivity lost");
                }
                was_online = now_online;
            }
        }
    }
    trace!("connectivity listener stopped");
}

async fn drain_triggers(
    mut triggers: mpsc::UnboundedReceiver<EntityType>,
    coordinator: Arc<SyncCoordinator>,
    connectivity: ConnectivityMonitor,
    session: SharedSession,
    shutdown: CancellationToken,
) {
    loop {
        let first = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = triggers.recv() => match next {
                Some(entity_type) => entity_type,
                None => break,
            },
        };

        let mut requested = BTreeSet::from([first]);
        while let Ok(entity_type) = triggers.try_recv() {
            requested.insert(entity_type);
        }

        let signed_in = session.read().is_some();
        if !connectivity.is_online() || !signed_in {
            trace!(types = requested.len(), "sync request deferred");
            continue;
        }

        for entity_type in EntityType::sync_order() {
            if !requested.contains(&entity_type) {
                continue;
            }
            if let Err(e) = coordinator.sync_entity_type(entity_type).await {
                warn!(entity_type = %entity_type, error = %e, "requested sync pass failed");
            }
        }
    }
    trace!("trigger listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRemote;
    use plansync_model::{Entity, Task};
    use plansync_protocol::{RemoteChange, RemoteRow};
    use std::time::Duration;

    fn service(online: bool) -> (Arc<MockRemote>, SyncService) {
        let store = Arc::new(LocalStore::open_in_memory());
        let remote = Arc::new(MockRemote::new());
        let config = SyncConfig::new().with_entity_delay(Duration::ZERO);
        let service = SyncService::new(
            config,
            store,
            remote.clone(),
            remote.clone(),
            ConnectivityMonitor::new(online),
        );
        (remote, service)
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let (_remote, service) = service(true);
        service.start().unwrap();
        assert!(matches!(
            service.start(),
            Err(SyncError::InvalidStateTransition { .. })
        ));
        service.shutdown().await;
    }

    #[tokio::test]
    async fn login_refreshes_and_subscribes() {
        let (remote, service) = service(true);
        let seeded: Entity = Task::new("u1", "from server").into();
        remote.seed(RemoteRow::from_entity(&seeded).unwrap()).unwrap();

        service.start().unwrap();
        service.on_authenticated(Session::new("u1", "token")).await;

        assert!(service.is_authenticated());
        assert!(service.realtime().is_subscribed());
        assert!(service.store().contains(EntityType::Task, seeded.id()));

        service.on_logout().await;
        assert!(!service.is_authenticated());
        assert!(!service.realtime().is_subscribed());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn local_write_is_pushed_by_trigger() {
        let (remote, service) = service(true);
        service.start().unwrap();
        service.on_authenticated(Session::new("u1", "token")).await;

        let task = service
            .repository()
            .create(Task::new("u1", "push me").into())
            .unwrap();
        let id = task.id().to_string();
        eventually(|| remote.row("tasks", &id).is_some()).await;
        eventually(|| service.ledger().get_pending_operation(&id, EntityType::Task).is_none()).await;
        service.shutdown().await;
    }

    #[tokio::test]
    async fn reconnect_flushes_offline_writes() {
        let (remote, service) = service(false);
        service.start().unwrap();
        *service.session.write() = Some(Session::new("u1", "token"));

        let task = service
            .repository()
            .create(Task::new("u1", "written offline").into())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(remote.row("tasks", task.id()).is_none());

        service.connectivity().set_online(true);
        let id = task.id().to_string();
        eventually(|| remote.row("tasks", &id).is_some()).await;
        service.shutdown().await;
    }

    #[tokio::test]
    async fn realtime_events_flow_into_store() {
        let (remote, service) = service(true);
        service.start().unwrap();
        service.on_authenticated(Session::new("u1", "token")).await;

        let incoming: Entity = Task::new("u1", "other device").into();
        let row = RemoteRow::from_entity(&incoming).unwrap();
        remote.emit(&RemoteChange::insert("public", row.table, row.value));

        let id = incoming.id().to_string();
        eventually(|| service.store().contains(EntityType::Task, &id)).await;
        service.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_stops_realtime() {
        let (_remote, service) = service(true);
        service.start().unwrap();
        service.on_authenticated(Session::new("u1", "token")).await;
        service.shutdown().await;
        assert!(!service.realtime().is_subscribed());
    }
}
