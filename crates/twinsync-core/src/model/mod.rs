// ── Domain model ──
//
// Identity and state types shared by the mirror, the store, and consumers.

pub mod snapshot;
pub mod thing_id;

pub use snapshot::{FeatureMap, FeatureValue, Snapshot};
pub use thing_id::ThingId;
