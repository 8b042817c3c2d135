// ── Twin mirror ──
//
// Applies inbound notifications to the local map of child twins and
// publishes the result. Owned by the connector's supervisor task, which is
// the only writer; everyone else reads `Snapshot`s from the `StateStore`.

use std::collections::HashMap;
use std::sync::Arc;

use twinsync_api::{Notification, Request, Thing};

use crate::model::{FeatureMap, ThingId};
use crate::store::StateStore;
use crate::subscription::{self, ChildSet, RequestSink};

/// What a single inbound message did to the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Root update: the child set was re-diffed.
    Root { subscribed: usize, unsubscribed: usize },
    /// A tracked child's features were replaced.
    Updated(ThingId),
    /// Update for a twin we no longer track (lost a race with an unsubscribe).
    UnknownSubject(ThingId),
    /// Notification type we don't handle.
    Ignored,
    /// Frame could not be decoded.
    Malformed,
}

/// Local mirror of the root twin's children.
pub struct TwinMirror {
    root: ThingId,
    child_suffix: String,
    things: HashMap<ThingId, Arc<FeatureMap>>,
    store: Arc<StateStore>,
}

impl TwinMirror {
    pub fn new(root: ThingId, child_suffix: impl Into<String>, store: Arc<StateStore>) -> Self {
        Self {
            root,
            child_suffix: child_suffix.into(),
            things: HashMap::new(),
            store,
        }
    }

    pub fn root(&self) -> &ThingId {
        &self.root
    }

    /// Currently tracked children.
    pub fn tracked(&self) -> ChildSet {
        self.things.keys().cloned().collect()
    }

    pub fn is_tracking(&self, id: &str) -> bool {
        self.things.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }

    /// Subscribe to the root twin. Sent on every (re)connect; the server's
    /// `initial` reply rebuilds the whole child set.
    pub fn resubscribe_root(&self, sink: &dyn RequestSink) {
        sink.send_request(&Request::subscribe(self.root.as_str()));
    }

    /// Decode and apply one text frame.
    pub fn on_message(&mut self, text: &str, sink: &dyn RequestSink) -> Applied {
        match Notification::decode(text) {
            Ok(notification) => self.apply(notification, sink),
            Err(e) => {
                tracing::info!(error = %e, "dropping undecodable message");
                tracing::debug!(body = text, "undecodable message body");
                Applied::Malformed
            }
        }
    }

    /// Apply a decoded notification.
    pub fn apply(&mut self, notification: Notification, sink: &dyn RequestSink) -> Applied {
        let Some(thing) = notification.into_thing() else {
            tracing::trace!("ignoring notification without a thing");
            return Applied::Ignored;
        };

        if thing.name() == self.root.as_str() {
            return self.apply_root(&thing, sink);
        }

        let id = ThingId::new(thing.metadata.name.as_str());
        let Some(entry) = self.things.get_mut(id.as_str()) else {
            tracing::trace!(thing = %id, "update for untracked thing ignored");
            return Applied::UnknownSubject(id);
        };

        *entry = Arc::new(merge(thing));
        tracing::debug!(thing = %id, features = entry.len(), "thing updated");
        self.publish();
        Applied::Updated(id)
    }

    /// Forget everything and publish an empty snapshot.
    pub fn on_disconnected(&mut self) {
        if !self.things.is_empty() {
            tracing::debug!(things = self.things.len(), "clearing mirror");
        }
        self.things.clear();
        self.store.clear();
    }

    fn apply_root(&mut self, root: &Thing, sink: &dyn RequestSink) -> Applied {
        let next = subscription::children_of(&root.reported_state, &self.child_suffix);
        let delta = subscription::diff(&self.tracked(), &next);

        for id in &delta.unsubscribe {
            self.things.remove(id);
        }
        for id in &delta.subscribe {
            self.things.insert(id.clone(), Arc::new(FeatureMap::new()));
        }
        delta.emit(sink);

        if !delta.is_empty() {
            tracing::info!(
                subscribed = delta.subscribe.len(),
                unsubscribed = delta.unsubscribe.len(),
                children = self.things.len(),
                "child set changed"
            );
        }

        self.publish();
        Applied::Root {
            subscribed: delta.subscribe.len(),
            unsubscribed: delta.unsubscribe.len(),
        }
    }

    fn publish(&self) {
        let things = self
            .things
            .iter()
            .map(|(id, features)| (id.clone(), Arc::clone(features)))
            .collect();
        self.store.publish(things);
    }
}

/// Reported state overlaid with synthetic state; synthetic wins per key.
pub fn merge(thing: Thing) -> FeatureMap {
    let mut features = thing.reported_state;
    features.extend(thing.synthetic_state);
    features
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Request>>);

    impl RequestSink for Recorder {
        fn send_request(&self, request: &Request) {
            self.0.borrow_mut().push(request.clone());
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<Request> {
            std::mem::take(&mut *self.0.borrow_mut())
        }
    }

    fn mirror() -> (TwinMirror, Arc<StateStore>) {
        let store = Arc::new(StateStore::new());
        let mirror = TwinMirror::new(ThingId::from("root"), "/sensor", Arc::clone(&store));
        (mirror, store)
    }

    fn root_frame(children: Value) -> String {
        json!({
            "type": "change",
            "thing": {
                "metadata": { "name": "root" },
                "reportedState": { "$children": { "value": children } }
            }
        })
        .to_string()
    }

    fn child_frame(name: &str, reported: Value, synthetic: Value) -> String {
        json!({
            "type": "change",
            "thing": {
                "metadata": { "name": name },
                "reportedState": reported,
                "syntheticState": synthetic
            }
        })
        .to_string()
    }

    #[test]
    fn resubscribe_sends_root_subscription() {
        let (mirror, _) = mirror();
        let sink = Recorder::default();
        mirror.resubscribe_root(&sink);
        assert_eq!(sink.take(), vec![Request::subscribe("root")]);
    }

    #[test]
    fn child_set_changes_emit_only_the_delta() {
        let (mut mirror, store) = mirror();
        let sink = Recorder::default();

        let applied = mirror.on_message(&root_frame(json!({ "a": {}, "b": {} })), &sink);
        assert_eq!(applied, Applied::Root { subscribed: 2, unsubscribed: 0 });
        assert_eq!(
            sink.take(),
            vec![Request::subscribe("a/sensor"), Request::subscribe("b/sensor")]
        );

        let applied = mirror.on_message(&root_frame(json!({ "b": {}, "c": {} })), &sink);
        assert_eq!(applied, Applied::Root { subscribed: 1, unsubscribed: 1 });
        assert_eq!(
            sink.take(),
            vec![Request::unsubscribe("a/sensor"), Request::subscribe("c/sensor")]
        );

        let snap = store.current();
        let keys: Vec<&str> = snap.things().keys().map(ThingId::as_str).collect();
        assert_eq!(keys, vec!["b/sensor", "c/sensor"]);
    }

    #[test]
    fn repeated_root_update_is_idempotent() {
        let (mut mirror, _) = mirror();
        let sink = Recorder::default();
        mirror.on_message(&root_frame(json!(["a", "b"])), &sink);
        sink.take();

        let applied = mirror.on_message(&root_frame(json!(["b", "a"])), &sink);
        assert_eq!(applied, Applied::Root { subscribed: 0, unsubscribed: 0 });
        assert!(sink.take().is_empty());
    }

    #[test]
    fn new_children_start_empty() {
        let (mut mirror, store) = mirror();
        mirror.on_message(&root_frame(json!(["a"])), &Recorder::default());
        let snap = store.current();
        assert!(snap.get("a/sensor").unwrap().is_empty());
        assert!(!snap.has_features());
    }

    #[test]
    fn synthetic_state_wins_on_merge() {
        let (mut mirror, store) = mirror();
        let sink = Recorder::default();
        mirror.on_message(&root_frame(json!(["a"])), &sink);

        let frame = child_frame(
            "a/sensor",
            json!({ "x": { "value": 1 } }),
            json!({ "x": { "value": 2 }, "y": { "value": 3 } }),
        );
        let applied = mirror.on_message(&frame, &sink);
        assert_eq!(applied, Applied::Updated(ThingId::from("a/sensor")));

        let snap = store.current();
        let features = snap.get("a/sensor").unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features["x"].value, json!(2));
        assert_eq!(features["y"].value, json!(3));
    }

    #[test]
    fn update_replaces_features_wholesale() {
        let (mut mirror, store) = mirror();
        let sink = Recorder::default();
        mirror.on_message(&root_frame(json!(["a"])), &sink);
        mirror.on_message(
            &child_frame("a/sensor", json!({ "x": { "value": 1 } }), json!({})),
            &sink,
        );
        mirror.on_message(
            &child_frame("a/sensor", json!({ "y": { "value": 5 } }), json!({})),
            &sink,
        );

        let snap = store.current();
        let features = snap.get("a/sensor").unwrap();
        assert!(!features.contains_key("x"));
        assert_eq!(features["y"].value, json!(5));
    }

    #[test]
    fn untracked_updates_are_ignored() {
        let (mut mirror, store) = mirror();
        let before = store.current().version();

        let frame = child_frame("stranger/sensor", json!({ "x": { "value": 1 } }), json!({}));
        let applied = mirror.on_message(&frame, &Recorder::default());

        assert_eq!(applied, Applied::UnknownSubject(ThingId::from("stranger/sensor")));
        assert_eq!(store.current().version(), before);
    }

    #[test]
    fn disconnect_clears_and_late_updates_are_ignored() {
        let (mut mirror, store) = mirror();
        let sink = Recorder::default();
        mirror.on_message(&root_frame(json!(["a"])), &sink);
        mirror.on_message(
            &child_frame("a/sensor", json!({ "x": { "value": 1 } }), json!({})),
            &sink,
        );
        assert!(store.current().has_features());

        mirror.on_disconnected();
        assert!(store.current().is_empty());
        assert!(!mirror.is_tracking("a/sensor"));

        let late = child_frame("a/sensor", json!({ "x": { "value": 9 } }), json!({}));
        assert_eq!(
            mirror.on_message(&late, &sink),
            Applied::UnknownSubject(ThingId::from("a/sensor"))
        );
        assert!(store.current().is_empty());
    }

    #[test]
    fn malformed_and_foreign_frames_leave_state_alone() {
        let (mut mirror, store) = mirror();
        let sink = Recorder::default();
        mirror.on_message(&root_frame(json!(["a"])), &sink);
        let version = store.current().version();

        assert_eq!(mirror.on_message("{not json", &sink), Applied::Malformed);
        assert_eq!(
            mirror.on_message(r#"{"type":"ack","thing":"a/sensor"}"#, &sink),
            Applied::Ignored
        );
        assert_eq!(store.current().version(), version);
        assert!(mirror.is_tracking("a/sensor"));
    }

    #[test]
    fn root_without_children_unsubscribes_everything() {
        let (mut mirror, store) = mirror();
        let sink = Recorder::default();
        mirror.on_message(&root_frame(json!(["a", "b"])), &sink);
        sink.take();

        let bare_root = r#"{"type":"initial","thing":{"metadata":{"name":"root"}}}"#;
        let applied = mirror.on_message(bare_root, &sink);
        assert_eq!(applied, Applied::Root { subscribed: 0, unsubscribed: 2 });
        assert_eq!(sink.take().len(), 2);
        assert!(store.current().is_empty());
    }
}
