//! Realtime change-feed listeners.

use crate::applier::{ApplyOutcome, RemoteApplier};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::remote::{ChangeSubscription, RealtimeSource};
use parking_lot::Mutex;
use plansync_model::EntityType;
use plansync_protocol::ChangeFilter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

struct ActiveSubscription {
    user_id: String,
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Owns one listener task per synced table for the signed-in user.
///
/// Each listener consumes its channel once and routes every event through the
/// [`RemoteApplier`]. Listeners stop on [`unsubscribe`](Self::unsubscribe),
/// when the parent token is cancelled, or when the source closes the feed.
pub struct RealtimeManager {
    source: Arc<dyn RealtimeSource>,
    applier: Arc<RemoteApplier>,
    schema: String,
    buffer: usize,
    parent: CancellationToken,
    active: Mutex<Option<ActiveSubscription>>,
    events: Arc<AtomicU64>,
}

impl RealtimeManager {
    /// Creates a manager whose listeners live under `parent`.
    ///
    /// Subscriptions use the config's schema and open one channel of
    /// `realtime_buffer` events per table.
    pub fn new(
        source: Arc<dyn RealtimeSource>,
        applier: Arc<RemoteApplier>,
        config: &SyncConfig,
        parent: CancellationToken,
    ) -> Self {
        Self {
            source,
            applier,
            schema: config.schema.clone(),
            buffer: config.realtime_buffer,
            parent,
            active: Mutex::new(None),
            events: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribes to every synced table, filtered to rows owned by `user_id`.
    ///
    /// An existing subscription is torn down first. If any table fails to
    /// subscribe, the listeners already started are cancelled.
    pub async fn subscribe(&self, user_id: &str) -> SyncResult<()> {
        self.unsubscribe().await;

        let token = self.parent.child_token();
        let mut handles = Vec::new();
        for entity_type in EntityType::sync_order() {
            let filter =
                ChangeFilter::table(self.schema.clone(), entity_type.table_name()).for_user(user_id);
            let subscription = match self.source.subscribe(filter, self.buffer).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(table = entity_type.table_name(), error = %e, "realtime subscribe failed");
                    token.cancel();
                    for handle in handles {
                        if let Err(e) = handle.await {
                            warn!(error = %e, "realtime listener panicked");
                        }
                    }
                    return Err(e);
                }
            };
            handles.push(tokio::spawn(listen(
                subscription,
                self.applier.clone(),
                token.clone(),
                self.events.clone(),
            )));
        }

        info!(user_id, tables = handles.len(), "realtime subscribed");
        let previous = self.active.lock().replace(ActiveSubscription {
            user_id: user_id.to_string(),
            token,
            handles,
        });
        if let Some(previous) = previous {
            // Lost a race with a concurrent subscribe.
            previous.token.cancel();
        }
        Ok(())
    }

    /// Cancels every listener and waits for them to stop.
    pub async fn unsubscribe(&self) {
        let Some(active) = self.active.lock().take() else {
            return;
        };
        active.token.cancel();
        for handle in active.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "realtime listener panicked");
            }
        }
        info!(user_id = %active.user_id, "realtime unsubscribed");
    }

    /// Returns true while listeners are running.
    pub fn is_subscribed(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|active| !active.token.is_cancelled())
    }

    /// User the listeners are filtered to.
    pub fn subscribed_user(&self) -> Option<String> {
        self.active.lock().as_ref().map(|a| a.user_id.clone())
    }

    /// Events received across all listeners.
    pub fn events_received(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for RealtimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeManager")
            .field("schema", &self.schema)
            .field("buffer", &self.buffer)
            .field("subscribed_user", &self.subscribed_user())
            .finish_non_exhaustive()
    }
}

async fn listen(
    mut subscription: ChangeSubscription,
    applier: Arc<RemoteApplier>,
    token: CancellationToken,
    events: Arc<AtomicU64>,
) {
    let table = subscription.filter.table.clone();
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            change = subscription.receiver.recv() => {
                let Some(change) = change else {
                    debug!(table = %table, "change feed closed");
                    break;
                };
                events.fetch_add(1, Ordering::Relaxed);
                match applier.apply_change(change) {
                    Ok(ApplyOutcome::Dropped(reason)) => {
                        trace!(table = %table, %reason, "remote change dropped");
                    }
                    Ok(outcome) => trace!(table = %table, ?outcome, "remote change handled"),
                    Err(e) => warn!(table = %table, error = %e, "failed to apply remote change"),
                }
            }
        }
    }
}
