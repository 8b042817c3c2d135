// ── Subscription tracking ──
//
// The root twin lists its children in the `$children` feature. Each time
// the root changes, the new child set is diffed against the tracked one and
// only the delta is (un)subscribed.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use twinsync_api::{Feature, MessageSink, Request};

use crate::model::ThingId;

/// Reported-state feature on the root twin that lists its children.
pub const CHILDREN_FEATURE: &str = "$children";

/// Set of child twins derived from one root update.
pub type ChildSet = BTreeSet<ThingId>;

/// Destination for subscription requests.
///
/// Implemented for the live connection's [`MessageSink`]; tests record.
pub trait RequestSink {
    fn send_request(&self, request: &Request);
}

impl RequestSink for MessageSink {
    fn send_request(&self, request: &Request) {
        match request.encode() {
            Ok(text) => {
                if !self.send_text(text) {
                    tracing::trace!(thing = request.thing(), "request dropped: connection closed");
                }
            }
            Err(e) => tracing::warn!(error = %e, thing = request.thing(), "cannot encode request"),
        }
    }
}

/// Minimal change between two child sets.
///
/// The two lists are disjoint, so an id is never both subscribed and
/// unsubscribed in the same delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionDelta {
    pub subscribe: Vec<ThingId>,
    pub unsubscribe: Vec<ThingId>,
}

impl SubscriptionDelta {
    pub fn is_empty(&self) -> bool {
        self.subscribe.is_empty() && self.unsubscribe.is_empty()
    }

    /// Send the delta: unsubscribes first, then subscribes.
    pub fn emit(&self, sink: &dyn RequestSink) {
        for id in &self.unsubscribe {
            sink.send_request(&Request::unsubscribe(id.as_str()));
        }
        for id in &self.subscribe {
            sink.send_request(&Request::subscribe(id.as_str()));
        }
    }
}

/// Compute what to subscribe and unsubscribe to move from `previous` to
/// `next`. Ids in both sets are left alone.
pub fn diff(previous: &ChildSet, next: &ChildSet) -> SubscriptionDelta {
    SubscriptionDelta {
        subscribe: next.difference(previous).cloned().collect(),
        unsubscribe: previous.difference(next).cloned().collect(),
    }
}

/// Child ids listed in a root twin's reported state.
///
/// `$children` may be an object (its keys are the children) or an array of
/// strings. Anything else, or no `$children` at all, means no children.
pub fn children_of(reported: &HashMap<String, Feature>, suffix: &str) -> ChildSet {
    let Some(feature) = reported.get(CHILDREN_FEATURE) else {
        return ChildSet::new();
    };

    match &feature.value {
        Value::Object(members) => members
            .keys()
            .map(|raw| ThingId::child(raw, suffix))
            .collect(),
        Value::Array(members) => members
            .iter()
            .filter_map(Value::as_str)
            .map(|raw| ThingId::child(raw, suffix))
            .collect(),
        _ => ChildSet::new(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Request>>);

    impl RequestSink for Recorder {
        fn send_request(&self, request: &Request) {
            self.0.borrow_mut().push(request.clone());
        }
    }

    fn set(ids: &[&str]) -> ChildSet {
        ids.iter().map(|id| ThingId::from(*id)).collect()
    }

    fn reported(children: Value) -> HashMap<String, Feature> {
        let mut state = HashMap::new();
        state.insert(CHILDREN_FEATURE.to_owned(), Feature::new(children));
        state
    }

    #[test]
    fn identical_sets_produce_no_requests() {
        let ids = set(&["a/sensor", "b/sensor"]);
        let delta = diff(&ids, &ids);
        assert!(delta.is_empty());

        let recorder = Recorder::default();
        delta.emit(&recorder);
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn delta_touches_only_changed_ids() {
        let delta = diff(&set(&["a/sensor", "b/sensor"]), &set(&["b/sensor", "c/sensor"]));
        assert_eq!(delta.subscribe, vec![ThingId::from("c/sensor")]);
        assert_eq!(delta.unsubscribe, vec![ThingId::from("a/sensor")]);

        let recorder = Recorder::default();
        delta.emit(&recorder);
        assert_eq!(
            *recorder.0.borrow(),
            vec![
                Request::unsubscribe("a/sensor"),
                Request::subscribe("c/sensor"),
            ]
        );
    }

    #[test]
    fn from_empty_subscribes_everything() {
        let delta = diff(&ChildSet::new(), &set(&["a", "b"]));
        assert_eq!(delta.subscribe.len(), 2);
        assert!(delta.unsubscribe.is_empty());
    }

    #[test]
    fn children_from_object_keys() {
        let state = reported(json!({ "dev1": {}, "dev2": { "since": 3 } }));
        assert_eq!(children_of(&state, "/sensor"), set(&["dev1/sensor", "dev2/sensor"]));
    }

    #[test]
    fn children_from_string_array() {
        let state = reported(json!(["dev1", 7, "dev2", null]));
        assert_eq!(children_of(&state, "/sensor"), set(&["dev1/sensor", "dev2/sensor"]));
    }

    #[test]
    fn missing_or_scalar_children_is_empty() {
        assert!(children_of(&HashMap::new(), "/sensor").is_empty());
        assert!(children_of(&reported(json!("dev1")), "/sensor").is_empty());
        assert!(children_of(&reported(Value::Null), "/sensor").is_empty());
    }
}
