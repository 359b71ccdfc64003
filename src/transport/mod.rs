//! Duplex connection to the inference endpoint.
//!
//! A transport opens one connection per session. Outbound frames go through a
//! [`TransportHandle`]; inbound messages and close notifications arrive on the
//! event channel handed to [`SessionTransport::open`].

mod handle;
mod mock;
#[cfg(test)]
mod tests;
mod websocket;

pub use handle::TransportHandle;
pub use mock::{MockConnection, MockTransport};
pub use websocket::WebSocketTransport;

use crate::error::TransportError;
use crate::session::EndpointParams;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Something that happened on an open connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// One inbound message, text payloads as UTF-8 bytes
    Message(Vec<u8>),
    /// The remote side closed the connection
    Closed { reason: String },
    /// The connection failed while open
    Error(TransportError),
}

#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open a connection for `params`. Events for this connection are sent to `events` until it closes.
    async fn open(
        &self,
        params: &EndpointParams,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<TransportHandle, TransportError>;
}
