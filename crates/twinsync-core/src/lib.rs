// twinsync-core: keeps a local, consistent mirror of a root twin's children.
//
// `Connector` owns the connection lifecycle, `TwinMirror` applies
// notifications and drives subscription diffs, and `StateStore` hands
// immutable snapshots to any number of readers.

pub mod config;
pub mod connector;
pub mod error;
pub mod mirror;
pub mod model;
pub mod reconnect;
pub mod store;
pub mod stream;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{ConnectorConfig, DEFAULT_CHILD_SUFFIX};
pub use connector::{ConnectionState, Connector};
pub use error::CoreError;
pub use mirror::{Applied, TwinMirror};
pub use model::{FeatureMap, FeatureValue, Snapshot, ThingId};
pub use reconnect::ReconnectConfig;
pub use store::StateStore;
pub use stream::SnapshotStream;
pub use subscription::{ChildSet, RequestSink, SubscriptionDelta};

// Collaborator traits live in the api crate; re-exported so embedders
// need only one dependency.
pub use twinsync_api::{CredentialProvider, Request, Transport, TransportConfig};
