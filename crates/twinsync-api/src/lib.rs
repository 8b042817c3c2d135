// twinsync-api: wire protocol and connection plumbing for twin notification endpoints

pub mod auth;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod websocket;

pub use auth::{ClientCredentials, CredentialProvider, StaticToken};
pub use endpoint::{notification_url, redacted};
pub use error::Error;
pub use protocol::{Feature, Notification, Request, Thing, ThingMetadata};
pub use session::{MessageSink, Session, SessionPeer, Transport};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::WebSocketTransport;
