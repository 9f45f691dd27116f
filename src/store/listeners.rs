use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::{StreamExt, stream};
use tokio::sync::watch;

use crate::store::{DocumentPath, Snapshot, SnapshotStream, StoreError};

type Slot = Option<Snapshot>;
type ChannelMap = HashMap<DocumentPath, watch::Sender<Slot>>;
type Channels = Arc<Mutex<ChannelMap>>;

/// Per-document fan-out of committed snapshots to live subscribers.
///
/// Updates only ever move a slot forward in version. Stores register a
/// subscriber first and then publish the snapshot they read, so a commit that
/// lands in between is never lost and a stale read never wins. A path's
/// channel lives exactly as long as its last subscription.
pub(crate) struct Listeners {
    channels: Channels,
    connection: watch::Sender<u64>,
}

struct Subscription {
    path: DocumentPath,
    channels: Channels,
    rx: watch::Receiver<Slot>,
    connection: watch::Receiver<u64>,
    primed: bool,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut channels = lock(&self.channels);

        // `self.rx` is still counted here
        if channels
            .get(&self.path)
            .is_some_and(|tx| tx.receiver_count() <= 1)
        {
            channels.remove(&self.path);
        }
    }
}

fn lock(channels: &Channels) -> MutexGuard<'_, ChannelMap> {
    channels.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Listeners {
            channels: Arc::new(Mutex::new(HashMap::new())),
            connection: watch::Sender::new(0),
        }
    }

    pub(crate) fn publish(&self, path: &DocumentPath, snapshot: Snapshot) {
        if let Some(tx) = lock(&self.channels).get(path) {
            advance(tx, snapshot);
        }
    }

    /// Registers a subscriber. The first item is whatever the slot holds when
    /// the stream is first polled.
    pub(crate) fn subscribe(&self, path: &DocumentPath) -> SnapshotStream {
        let rx = lock(&self.channels)
            .entry(path.clone())
            .or_insert_with(|| watch::Sender::new(None))
            .subscribe();

        let state = Subscription {
            path: path.clone(),
            channels: Arc::clone(&self.channels),
            rx,
            connection: self.connection.subscribe(),
            primed: false,
        };

        stream::unfold(Some(state), |state| async move {
            let mut sub = state?;

            if !sub.primed {
                sub.primed = true;
                let first = sub.rx.borrow_and_update().clone();
                return Some((Ok(first), Some(sub)));
            }

            tokio::select! {
                changed = sub.rx.changed() => match changed {
                    Ok(()) => {
                        let next = sub.rx.borrow_and_update().clone();
                        Some((Ok(next), Some(sub)))
                    }
                    Err(_) => Some((Err(StoreError::Disconnected), None)),
                },
                _ = sub.connection.changed() => Some((Err(StoreError::Disconnected), None)),
            }
        })
        .boxed()
    }

    /// Drops every live subscription with a `Disconnected` error.
    pub(crate) fn sever(&self) {
        self.connection.send_modify(|generation| *generation += 1);
    }

    pub(crate) fn listener_count(&self, path: &DocumentPath) -> usize {
        lock(&self.channels)
            .get(path)
            .map_or(0, |tx| tx.receiver_count())
    }
}

fn advance(tx: &watch::Sender<Slot>, candidate: Snapshot) {
    tx.send_if_modified(|slot| match slot {
        Some(current) if current.version >= candidate.version => false,
        _ => {
            *slot = Some(candidate);
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn snapshot(version: u64) -> Snapshot {
        Snapshot {
            version,
            body: json!({ "v": version }),
        }
    }

    #[tokio::test]
    async fn first_item_is_current_state() {
        let listeners = Listeners::new();
        let path = DocumentPath::new("users", "a");

        let mut stream = listeners.subscribe(&path);
        listeners.publish(&path, snapshot(3));

        assert_eq!(stream.next().await, Some(Ok(Some(snapshot(3)))));
    }

    #[tokio::test]
    async fn stale_initial_read_does_not_regress() {
        let listeners = Listeners::new();
        let path = DocumentPath::new("users", "a");

        let mut first = listeners.subscribe(&path);
        listeners.publish(&path, snapshot(1));
        assert_eq!(first.next().await, Some(Ok(Some(snapshot(1)))));

        let mut late = listeners.subscribe(&path);
        listeners.publish(&path, snapshot(2));
        // the late subscriber's own read was older than the commit above
        listeners.publish(&path, snapshot(1));

        assert_eq!(first.next().await, Some(Ok(Some(snapshot(2)))));
        assert_eq!(late.next().await, Some(Ok(Some(snapshot(2)))));
    }

    #[tokio::test]
    async fn sever_ends_streams_with_error() {
        let listeners = Listeners::new();
        let path = DocumentPath::new("users", "a");

        let mut stream = listeners.subscribe(&path);
        assert_eq!(stream.next().await, Some(Ok(None)));

        listeners.sever();

        assert_eq!(stream.next().await, Some(Err(StoreError::Disconnected)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn dropping_stream_releases_listener() {
        let listeners = Listeners::new();
        let path = DocumentPath::new("users", "a");

        let stream = listeners.subscribe(&path);
        assert_eq!(listeners.listener_count(&path), 1);

        drop(stream);
        assert_eq!(listeners.listener_count(&path), 0);
        assert!(lock(&listeners.channels).is_empty());
    }

    #[test]
    fn unwritten_documents_leave_no_channels() {
        let listeners = Listeners::new();

        for i in 0..1000 {
            drop(listeners.subscribe(&DocumentPath::new("users", i)));
        }

        assert!(lock(&listeners.channels).is_empty());
    }

    #[tokio::test]
    async fn channel_outlives_all_but_last_subscriber() {
        let listeners = Listeners::new();
        let path = DocumentPath::new("users", "a");

        let first = listeners.subscribe(&path);
        let mut second = listeners.subscribe(&path);
        drop(first);
        assert_eq!(listeners.listener_count(&path), 1);

        listeners.publish(&path, snapshot(4));
        assert_eq!(second.next().await, Some(Ok(Some(snapshot(4)))));

        drop(second);
        assert!(lock(&listeners.channels).is_empty());
    }

    #[tokio::test]
    async fn severed_stream_releases_channel_before_drop() {
        let listeners = Listeners::new();
        let path = DocumentPath::new("users", "a");

        let mut stream = listeners.subscribe(&path);
        assert_eq!(stream.next().await, Some(Ok(None)));

        listeners.sever();
        assert_eq!(stream.next().await, Some(Err(StoreError::Disconnected)));

        assert!(lock(&listeners.channels).is_empty());
    }
}
