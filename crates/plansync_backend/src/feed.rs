//! Realtime change feed.

use parking_lot::Mutex;
use plansync_protocol::{ChangeFilter, RemoteChange};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc};
use tracing::{trace, warn};

/// Fans committed changes out to filtered subscribers.
///
/// Every change also goes to an unfiltered broadcast firehose. A subscriber
/// whose channel is full misses the event; the miss is logged and counted.
#[derive(Debug)]
pub(crate) struct ChangeFeed {
    subscribers: Mutex<Vec<(ChangeFilter, mpsc::Sender<RemoteChange>)>>,
    firehose: broadcast::Sender<RemoteChange>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl ChangeFeed {
    pub fn new(firehose_capacity: usize) -> Self {
        let (firehose, _) = broadcast::channel(firehose_capacity);
        Self {
            subscribers: Mutex::new(Vec::new()),
            firehose,
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Opens a filtered subscription holding up to `capacity` events.
    pub fn subscribe(&self, filter: ChangeFilter, capacity: usize) -> mpsc::Receiver<RemoteChange> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.subscribers.lock().push((filter, tx));
        rx
    }

    /// Opens an unfiltered subscription.
    pub fn firehose(&self) -> broadcast::Receiver<RemoteChange> {
        self.firehose.subscribe()
    }

    /// Delivers a change. Returns the number of filtered subscribers reached.
    pub fn publish(&self, change: &RemoteChange) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        // No firehose listeners is fine.
        let _ = self.firehose.send(change.clone());

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, tx)| !tx.is_closed());

        let mut delivered = 0;
        for (filter, tx) in subscribers.iter() {
            if !filter.matches(change) {
                continue;
            }
            match tx.try_send(change.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(table = %change.table, "subscriber lagging, change event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        trace!(table = %change.table, kind = ?change.kind, delivered, "published change");
        delivered
    }

    /// Live filtered subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|(_, tx)| !tx.is_closed());
        subscribers.len()
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(user: &str) -> RemoteChange {
        RemoteChange::insert(
            "public",
            "goals",
            json!({"id": "g1", "user_id": user, "updated_at": "2026-01-01T00:00:00Z"}),
        )
    }

    #[tokio::test]
    async fn filtered_delivery() {
        let feed = ChangeFeed::new(8);
        let mut mine = feed.subscribe(ChangeFilter::table("public", "goals").for_user("u1"), 8);
        let mut all = feed.firehose();

        assert_eq!(feed.publish(&change("u1")), 1);
        assert_eq!(feed.publish(&change("u2")), 0);

        assert_eq!(mine.recv().await.unwrap().owner(), Some("u1"));
        assert!(mine.try_recv().is_err());
        assert_eq!(all.recv().await.unwrap().owner(), Some("u1"));
        assert_eq!(all.recv().await.unwrap().owner(), Some("u2"));
        assert_eq!(feed.published(), 2);
    }

    #[test]
    fn full_subscriber_drops_events() {
        let feed = ChangeFeed::new(8);
        let _rx = feed.subscribe(ChangeFilter::table("public", "goals"), 1);
        assert_eq!(feed.publish(&change("u1")), 1);
        assert_eq!(feed.publish(&change("u1")), 0);
        assert_eq!(feed.dropped(), 1);
    }

    #[test]
    fn closed_subscribers_are_pruned() {
        let feed = ChangeFeed::new(4);
        let rx = feed.subscribe(ChangeFilter::table("public", "goals"), 4);
        assert_eq!(feed.subscriber_count(), 1);
        drop(rx);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
