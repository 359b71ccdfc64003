use super::{SessionTransport, TransportEvent, TransportHandle};
use crate::config::ServerConfig;
use crate::error::TransportError;
use crate::frame::OutboundFrame;
use crate::session::EndpointParams;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, trace, warn, Instrument};
use url::Url;

/// WebSocket connection to the inference server's frame endpoint
pub struct WebSocketTransport {
    base_url: String,
    connect_timeout: Duration,
    outbound_capacity: usize,
}

impl WebSocketTransport {
    pub fn new(server: &ServerConfig, outbound_capacity: usize) -> Self {
        Self {
            base_url: format!(
                "{}://{}:{}{}",
                server.ws_scheme, server.host, server.port, server.ws_path
            ),
            connect_timeout: Duration::from_millis(server.connect_timeout_ms),
            outbound_capacity: outbound_capacity.max(1),
        }
    }

    /// `<base>?target=<lang>[&source=<lang>]`
    pub fn endpoint_url(&self, params: &EndpointParams) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| TransportError::Endpoint {
            reason: format!("{}: {}", self.base_url, e),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("target", &params.target_language);
            if let Some(source) = &params.source_language {
                query.append_pair("source", source);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl SessionTransport for WebSocketTransport {
    async fn open(
        &self,
        params: &EndpointParams,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<TransportHandle, TransportError> {
        let url = self.endpoint_url(params)?;
        debug!("Connecting to {}", url);

        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| TransportError::Timeout {
                timeout_ms: self.connect_timeout.as_millis() as u64,
            })?
            .map_err(|e| TransportError::connect(url.as_str(), e))?;

        info!("Connected to {}", url);

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(self.outbound_capacity);
        let (handle, cancel) = TransportHandle::new(outbound_tx);
        let task_handle = handle.clone();

        let span = tracing::debug_span!("ws_connection", handle = handle.id());
        tokio::spawn(
            async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            let _ = ws_tx.send(Message::Close(None)).await;
                            let _ = ws_tx.close().await;
                            debug!("Connection closed locally");
                            break;
                        }
                        frame = outbound_rx.recv() => {
                            let Some(frame) = frame else {
                                let _ = ws_tx.close().await;
                                break;
                            };
                            let message = match frame {
                                OutboundFrame::Text(text) => Message::Text(text),
                                OutboundFrame::Binary(bytes) => Message::Binary(bytes),
                            };
                            if let Err(e) = ws_tx.send(message).await {
                                warn!("Write failed: {}", e);
                                task_handle.mark_closed();
                                let _ = events
                                    .send(TransportEvent::Error(TransportError::Closed {
                                        reason: e.to_string(),
                                    }))
                                    .await;
                                break;
                            }
                        }
                        message = ws_rx.next() => {
                            match message {
                                Some(Ok(Message::Text(text))) => {
                                    trace!("Received text message ({} bytes)", text.len());
                                    if events.send(TransportEvent::Message(text.into_bytes())).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(Message::Binary(bytes))) => {
                                    if events.send(TransportEvent::Message(bytes)).await.is_err() {
                                        break;
                                    }
                                }
                                Some(Ok(Message::Close(frame))) => {
                                    task_handle.mark_closed();
                                    let reason = frame
                                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                                        .unwrap_or_else(|| "no close frame".to_string());
                                    info!("Server closed connection: {}", reason);
                                    let _ = events.send(TransportEvent::Closed { reason }).await;
                                    break;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    warn!("Read failed: {}", e);
                                    task_handle.mark_closed();
                                    let _ = events
                                        .send(TransportEvent::Error(TransportError::protocol(e)))
                                        .await;
                                    break;
                                }
                                None => {
                                    task_handle.mark_closed();
                                    let _ = events
                                        .send(TransportEvent::Closed {
                                            reason: "stream ended".to_string(),
                                        })
                                        .await;
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            .instrument(span),
        );

        Ok(handle)
    }
}
