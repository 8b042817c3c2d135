//! WebSocket transport for the notification endpoint.
//!
//! [`WebSocketTransport::open`] performs the handshake (with the configured
//! TLS mode and timeout) and spawns a pump task that shuttles text frames
//! between the socket and the returned [`Session`]. The pump ends when
//! either side closes; the session then sees `recv() == None`.
//!
//! # Example
//!
//! ```rust,ignore
//! use twinsync_api::{Request, Transport, TransportConfig, WebSocketTransport};
//!
//! let transport = WebSocketTransport::new(TransportConfig::default());
//! let mut session = transport.open(&url).await?;
//! session.sender().send_text(Request::subscribe("root").encode()?);
//!
//! while let Some(text) = session.recv().await {
//!     println!("{text}");
//! }
//! ```

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, WebSocketStream};
use url::Url;

use crate::endpoint::redacted;
use crate::error::Error;
use crate::session::{Session, SessionPeer, Transport};
use crate::transport::TransportConfig;

/// [`Transport`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: TransportConfig,
}

impl WebSocketTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &Url) -> Result<Session, Error> {
        tracing::debug!(url = %redacted(url), "Opening WebSocket");

        let connector = self.config.rustls_config()?.map(Connector::Rustls);
        let handshake =
            tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector);

        let (ws_stream, _response) = tokio::time::timeout(self.config.timeout, handshake)
            .await
            .map_err(|_| Error::Timeout {
                timeout_secs: self.config.timeout.as_secs(),
            })?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::debug!("WebSocket handshake complete");

        let (session, peer) = Session::pair();
        tokio::spawn(pump(ws_stream, peer));
        Ok(session)
    }
}

// ── Frame pump ───────────────────────────────────────────────────────

/// Move frames until the socket or the session closes.
async fn pump<S>(ws_stream: WebSocketStream<S>, mut peer: SessionPeer)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            outbound = peer.next_outbound() => {
                let Some(text) = outbound else {
                    // Session dropped on our side.
                    let _ = write.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    tracing::warn!(error = %e, "WebSocket write failed");
                    break;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if !peer.deliver(text.as_str()) {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite queues the pong; it goes out with the next write
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "WebSocket closed by server");
                        } else {
                            tracing::info!("WebSocket closed by server");
                        }
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket read failed");
                        break;
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary, Pong, raw frames
                    }
                }
            }
        }
    }

    tracing::debug!("WebSocket pump exiting");
}
