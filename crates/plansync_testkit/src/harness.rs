//! Sync harness for integration tests.

use crate::fixtures::TestStore;
use plansync_backend::MemoryBackend;
use plansync_model::Entity;
use plansync_protocol::RemoteRow;
use plansync_store::LocalStore;
use plansync_sync::{
    ConnectivityMonitor, EntityRepository, PendingLedger, RealtimeManager, RemoteApplier, Session,
    SyncConfig, SyncCoordinator,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A local store, a reference backend and a coordinator wired together for
/// one signed-in user.
pub struct SyncHarness {
    test_store: TestStore,
    backend: MemoryBackend,
    client: MemoryBackend,
    session: Session,
    config: SyncConfig,
    connectivity: ConnectivityMonitor,
    ledger: Arc<PendingLedger>,
    applier: Arc<RemoteApplier>,
    coordinator: SyncCoordinator,
}

impl SyncHarness {
    /// Creates a harness over an in-memory store, with no delay between
    /// entities.
    pub fn new(user_id: &str) -> Self {
        Self::with_config(
            user_id,
            SyncConfig::new().with_entity_delay(Duration::ZERO),
            TestStore::memory(),
        )
    }

    /// Creates a harness with an explicit config and store.
    pub fn with_config(user_id: &str, config: SyncConfig, test_store: TestStore) -> Self {
        let backend = MemoryBackend::default();
        let session = backend.sign_in(user_id).expect("Failed to sign in");
        let client = backend.attach(&session).expect("Failed to attach session");

        let store = test_store.store.clone();
        let connectivity = ConnectivityMonitor::new(true);
        let ledger = Arc::new(PendingLedger::new(store.clone(), connectivity.clone()));
        let applier = Arc::new(RemoteApplier::new(store.clone(), config.conflict_policy));
        let coordinator = SyncCoordinator::new(
            config.clone(),
            store,
            ledger.clone(),
            Arc::new(client.clone()),
            applier.clone(),
            connectivity.clone(),
        );

        Self {
            test_store,
            backend,
            client,
            session,
            config,
            connectivity,
            ledger,
            applier,
            coordinator,
        }
    }

    /// The local store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.test_store.store
    }

    /// The backend, acting as the service role.
    pub fn backend(&self) -> &MemoryBackend {
        &self.backend
    }

    /// The backend handle scoped to the harness user.
    pub fn client(&self) -> &MemoryBackend {
        &self.client
    }

    /// The harness user's session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The ledger.
    pub fn ledger(&self) -> &Arc<PendingLedger> {
        &self.ledger
    }

    /// The remote applier.
    pub fn applier(&self) -> &Arc<RemoteApplier> {
        &self.applier
    }

    /// The coordinator.
    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// The connectivity monitor.
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// A repository writing through the harness ledger.
    pub fn repository(&self) -> EntityRepository {
        EntityRepository::new(self.store().clone(), self.ledger.clone())
    }

    /// A realtime manager reading the harness user's feed.
    pub fn realtime(&self, shutdown: CancellationToken) -> RealtimeManager {
        RealtimeManager::new(
            Arc::new(self.client.clone()),
            self.applier.clone(),
            &self.config,
            shutdown,
        )
    }

    /// Flips both the device's connectivity and the backend's reachability.
    pub fn set_online(&self, online: bool) {
        self.backend.set_online(online);
        self.connectivity.set_online(online);
    }

    /// Writes `entity` to the backend as another device would.
    pub fn remote_write(&self, entity: &Entity) {
        let row = RemoteRow::from_entity(entity).expect("Failed to map entity");
        self.backend.remote_write(row).expect("Failed to write remote row");
    }

    /// Asserts the backend holds exactly `entity`.
    pub fn assert_remote_matches(&self, entity: &Entity) {
        let row = self
            .backend
            .row(entity.entity_type().table_name(), entity.id())
            .unwrap_or_else(|| panic!("{} {} missing on backend", entity.entity_type(), entity.id()));
        let remote = row.into_entity().expect("Failed to map remote row");
        assert_eq!(&remote, entity, "remote row differs from local");
    }

    /// Asserts the ledger is empty.
    pub fn assert_ledger_empty(&self) {
        let pending = self.store().all_pending();
        assert!(pending.is_empty(), "ledger still holds {pending:?}");
    }
}
