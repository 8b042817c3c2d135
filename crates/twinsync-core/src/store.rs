// ── Snapshot store ──
//
// Holds the latest published `Snapshot`. Readers go through `ArcSwap` and
// never block; the writer also pushes each snapshot into a `watch` channel
// for subscribers.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::watch;

use crate::model::{FeatureMap, Snapshot, ThingId};
use crate::stream::SnapshotStream;

/// Concurrency-safe holder of the latest mirror snapshot.
///
/// `current()` may be called from any thread at any time. Publishes are
/// serialized through the watch channel's lock, so versions are strictly
/// increasing even with several writers.
pub struct StateStore {
    current: ArcSwap<Snapshot>,
    tx: watch::Sender<Arc<Snapshot>>,
}

impl StateStore {
    pub fn new() -> Self {
        let empty = Arc::new(Snapshot::empty());
        let (tx, _) = watch::channel(Arc::clone(&empty));
        Self {
            current: ArcSwap::new(empty),
            tx,
        }
    }

    /// Atomically replace the held snapshot and notify subscribers.
    pub fn publish(&self, things: BTreeMap<ThingId, Arc<FeatureMap>>) -> Arc<Snapshot> {
        let mut published: Arc<Snapshot> = Arc::default();
        self.tx.send_modify(|held| {
            let next = Arc::new(Snapshot::new(held.version() + 1, things));
            self.current.store(Arc::clone(&next));
            published = Arc::clone(&next);
            *held = next;
        });
        tracing::trace!(
            version = published.version(),
            things = published.len(),
            "snapshot published"
        );
        published
    }

    /// Publish an empty snapshot.
    pub fn clear(&self) -> Arc<Snapshot> {
        self.publish(BTreeMap::new())
    }

    /// The most recently published snapshot, or the version-0 sentinel.
    pub fn current(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Subscribe to every future publish.
    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.tx.subscribe())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.current.load();
        f.debug_struct("StateStore")
            .field("version", &current.version())
            .field("things", &current.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use twinsync_api::Feature;

    fn things(ids: &[&str]) -> BTreeMap<ThingId, Arc<FeatureMap>> {
        ids.iter()
            .map(|id| {
                let mut features = FeatureMap::new();
                features.insert("x".into(), Feature::new(1));
                (ThingId::from(*id), Arc::new(features))
            })
            .collect()
    }

    #[test]
    fn starts_with_version_zero_sentinel() {
        let store = StateStore::new();
        let snap = store.current();
        assert_eq!(snap.version(), 0);
        assert!(snap.is_empty());
        assert!(snap.published_at().is_none());
    }

    #[test]
    fn publish_replaces_and_bumps_version() {
        let store = StateStore::new();
        let first = store.publish(things(&["a", "b"]));
        assert_eq!(first.version(), 1);
        assert_eq!(store.current().len(), 2);

        let second = store.clear();
        assert_eq!(second.version(), 2);
        assert!(store.current().is_empty());
        assert!(store.current().published_at().is_some());
    }

    #[test]
    fn earlier_snapshots_stay_intact() {
        let store = StateStore::new();
        let held = store.publish(things(&["a"]));
        store.publish(things(&["b", "c"]));
        assert!(held.contains("a"));
        assert_eq!(held.len(), 1);
    }

    #[test]
    fn concurrent_readers_never_see_torn_snapshots() {
        let store = Arc::new(StateStore::new());
        let sets: [&[&str]; 3] = [&["a", "b"], &["b", "c", "d"], &["e"]];

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..5_000 {
                        let snap = store.current();
                        let keys: Vec<&str> = snap.things().keys().map(ThingId::as_str).collect();
                        let consistent = keys.is_empty()
                            || sets.iter().any(|set| *set == keys.as_slice());
                        assert!(consistent, "torn snapshot: {keys:?}");
                    }
                })
            })
            .collect();

        for round in 0..3_000 {
            store.publish(things(sets[round % sets.len()]));
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
