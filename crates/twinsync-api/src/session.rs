//! Transport abstraction.
//!
//! A [`Transport`] opens a [`Session`]: one live, bidirectional text
//! connection. The session is the client's half; the transport keeps the
//! matching [`SessionPeer`] and pumps frames between it and the wire.
//!
//! - `Session::recv()` yielding `None` means the remote side closed.
//! - Dropping the `Session` closes the connection from our side.
//! - [`MessageSink::send_text`] is fire-and-forget and never blocks.
//!
//! Tests build sessions directly with [`Session::pair`] and drive the peer
//! end by hand.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

/// Opens connections to a notification endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the handshake against `url` and return the live session.
    async fn open(&self, url: &Url) -> Result<Session, Error>;
}

// ── MessageSink ──────────────────────────────────────────────────────

/// Outbound half of a session. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MessageSink {
    tx: mpsc::UnboundedSender<String>,
}

impl MessageSink {
    /// Queue a text frame. Returns `false` if the connection is already gone;
    /// the frame is dropped in that case.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.tx.send(text.into()).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// Client side of one open connection.
#[derive(Debug)]
pub struct Session {
    outbound: MessageSink,
    inbound: mpsc::UnboundedReceiver<String>,
    closed: CancellationToken,
}

impl Session {
    /// Create a connected session/peer pair.
    pub fn pair() -> (Self, SessionPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let session = Self {
            outbound: MessageSink { tx: out_tx },
            inbound: in_rx,
            closed: closed.clone(),
        };
        let peer = SessionPeer {
            outbound: out_rx,
            inbound: in_tx,
            closed,
        };
        (session, peer)
    }

    /// A handle for sending frames on this session.
    pub fn sender(&self) -> MessageSink {
        self.outbound.clone()
    }

    /// Wait for the next inbound text frame. `None` once the remote closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.closed.cancel();
    }
}

// ── SessionPeer ──────────────────────────────────────────────────────

/// Transport side of a session.
#[derive(Debug)]
pub struct SessionPeer {
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<String>,
    closed: CancellationToken,
}

impl SessionPeer {
    /// Next frame the client queued for sending. Frames queued before the
    /// client closed are still drained; `None` once the client closed.
    pub async fn next_outbound(&mut self) -> Option<String> {
        tokio::select! {
            biased;
            frame = self.outbound.recv() => frame,
            () = self.closed.cancelled() => self.outbound.try_recv().ok(),
        }
    }

    /// Non-blocking variant of [`next_outbound`](Self::next_outbound).
    pub fn try_next_outbound(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Hand an inbound frame to the client. Returns `false` if the client
    /// has already dropped its session.
    pub fn deliver(&self, text: impl Into<String>) -> bool {
        !self.closed.is_cancelled() && self.inbound.send(text.into()).is_ok()
    }

    /// Whether the client has closed its side.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the client has closed its side.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (mut session, mut peer) = Session::pair();

        assert!(session.sender().send_text("hello"));
        assert_eq!(peer.next_outbound().await.as_deref(), Some("hello"));

        assert!(peer.deliver("world"));
        assert_eq!(session.recv().await.as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn dropping_peer_closes_session() {
        let (mut session, peer) = Session::pair();
        drop(peer);
        assert!(session.recv().await.is_none());
        assert!(!session.sender().send_text("late"));
    }

    #[tokio::test]
    async fn dropping_session_closes_peer_even_with_live_sinks() {
        let (session, mut peer) = Session::pair();
        let sink = session.sender();
        sink.send_text("queued");
        drop(session);

        assert!(peer.is_closed());
        assert_eq!(peer.next_outbound().await.as_deref(), Some("queued"));
        assert!(peer.next_outbound().await.is_none());
        assert!(!peer.deliver("ignored"));
    }
}
