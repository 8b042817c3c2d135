// ── Published mirror state ──
//
// A `Snapshot` is the only view of the mirror that leaves the connector.
// It is immutable once built and shared behind an `Arc`; feature maps are
// `Arc`-shared with the mirror, so building one copies no feature data.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ThingId;

/// A single feature: opaque JSON payload plus server metadata.
pub type FeatureValue = twinsync_api::Feature;

/// Feature name → value for one twin, reported and synthetic state merged.
pub type FeatureMap = HashMap<String, FeatureValue>;

/// Point-in-time copy of every mirrored twin.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    version: u64,
    published_at: Option<DateTime<Utc>>,
    things: BTreeMap<ThingId, Arc<FeatureMap>>,
}

impl Snapshot {
    /// The sentinel held before anything has been published (version 0).
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(version: u64, things: BTreeMap<ThingId, Arc<FeatureMap>>) -> Self {
        Self {
            version,
            published_at: Some(Utc::now()),
            things,
        }
    }

    /// Monotonic publish counter; `0` until the first publish.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn things(&self) -> &BTreeMap<ThingId, Arc<FeatureMap>> {
        &self.things
    }

    pub fn get(&self, id: &str) -> Option<&Arc<FeatureMap>> {
        self.things.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.things.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.things.len()
    }

    pub fn is_empty(&self) -> bool {
        self.things.is_empty()
    }

    /// Whether at least one twin has received feature data.
    pub fn has_features(&self) -> bool {
        self.things.values().any(|features| !features.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ThingId, &Arc<FeatureMap>)> {
        self.things.iter()
    }
}
