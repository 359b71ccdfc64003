use crate::error::TransportError;
use crate::frame::OutboundFrame;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

struct HandleInner {
    id: u64,
    open: AtomicBool,
    outbound: mpsc::Sender<OutboundFrame>,
    cancel: CancellationToken,
}

/// Sending side of one open connection.
///
/// Clones share state: closing any clone closes the connection for all of them.
#[derive(Clone)]
pub struct TransportHandle {
    inner: Arc<HandleInner>,
}

impl TransportHandle {
    /// Create an open handle feeding `outbound`. The connection task watches the returned token.
    pub fn new(outbound: mpsc::Sender<OutboundFrame>) -> (Self, CancellationToken) {
        let cancel = CancellationToken::new();
        let handle = Self {
            inner: Arc::new(HandleInner {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
                open: AtomicBool::new(true),
                outbound,
                cancel: cancel.clone(),
            }),
        };
        (handle, cancel)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }

    /// Queue a frame for the writer without waiting. Full or closed queues drop the frame.
    pub fn send(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }

        match self.inner.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::Backpressure),
            Err(TrySendError::Closed(_)) => {
                self.mark_closed();
                Err(TransportError::NotOpen)
            }
        }
    }

    /// Close the connection. Safe to call any number of times.
    pub fn close(&self) {
        if self.inner.open.swap(false, Ordering::AcqRel) {
            debug!("Closing transport handle {}", self.inner.id);
        }
        self.inner.cancel.cancel();
    }

    /// Record that the remote side went away, without requesting a local close
    pub(crate) fn mark_closed(&self) {
        self.inner.open.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for TransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportHandle")
            .field("id", &self.inner.id)
            .field("open", &self.is_open())
            .finish()
    }
}
