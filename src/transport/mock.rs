use super::{SessionTransport, TransportEvent, TransportHandle};
use crate::error::TransportError;
use crate::frame::OutboundFrame;
use crate::session::EndpointParams;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

type Responder = Arc<dyn Fn(&OutboundFrame) -> Option<Vec<u8>> + Send + Sync>;
type Gate = oneshot::Sender<Result<(), TransportError>>;

#[derive(Default)]
struct MockState {
    connections: Vec<MockConnection>,
    failures: VecDeque<TransportError>,
}

/// In-process transport for tests and dry runs.
///
/// Every `open` call is recorded as a [`MockConnection`]. In manual mode an
/// open stays pending until the test releases or rejects it. Recording can be
/// switched off for long-running use, leaving only the counters.
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    attempts: watch::Sender<usize>,
    manual: bool,
    responder: Option<Responder>,
    outbound_capacity: usize,
    recording: bool,
    frames_received: Arc<AtomicU64>,
}

impl MockTransport {
    /// Opens succeed immediately
    pub fn new() -> Self {
        let (attempts, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            attempts,
            manual: false,
            responder: None,
            outbound_capacity: 16,
            recording: true,
            frames_received: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Opens wait for [`MockConnection::release`] or [`MockConnection::reject`]
    pub fn manual() -> Self {
        Self {
            manual: true,
            ..Self::new()
        }
    }

    /// Reply to every received frame with whatever `responder` returns
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&OutboundFrame) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }

    /// Keep neither connections nor sent frames, only the attempt and frame counters
    pub fn without_recording(mut self) -> Self {
        self.recording = false;
        self
    }

    /// Frames received across all connections
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    /// Make the next open attempt fail with `error`
    pub fn fail_next_open(&self, error: TransportError) {
        self.state.lock().failures.push_back(error);
    }

    /// Number of open attempts so far
    pub fn attempts(&self) -> usize {
        *self.attempts.borrow()
    }

    pub fn connection(&self, index: usize) -> Option<MockConnection> {
        self.state.lock().connections.get(index).cloned()
    }

    pub fn last_connection(&self) -> Option<MockConnection> {
        self.state.lock().connections.last().cloned()
    }

    pub fn connections(&self) -> Vec<MockConnection> {
        self.state.lock().connections.clone()
    }

    /// Wait until at least `count` open attempts were made
    pub async fn wait_for_attempts(&self, count: usize) {
        let mut attempts = self.attempts.subscribe();
        let _ = attempts.wait_for(|n| *n >= count).await;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionTransport for MockTransport {
    async fn open(
        &self,
        params: &EndpointParams,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<TransportHandle, TransportError> {
        let (gate, gate_rx) = if self.manual {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let (failure, connection) = {
            let mut state = self.state.lock();
            let connection = MockConnection {
                index: *self.attempts.borrow(),
                params: params.clone(),
                events: events.clone(),
                handle: Arc::new(Mutex::new(None)),
                sent: Arc::new(Mutex::new(Vec::new())),
                sent_total: Arc::new(AtomicUsize::new(0)),
                gate: Arc::new(Mutex::new(gate)),
            };
            if self.recording {
                state.connections.push(connection.clone());
            }
            self.attempts.send_modify(|n| *n += 1);
            (state.failures.pop_front(), connection)
        };
        debug!(
            "Mock open #{} for target={}",
            connection.index, params.target_language
        );

        if let Some(error) = failure {
            return Err(error);
        }

        if let Some(gate_rx) = gate_rx {
            match gate_rx.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => return Err(error),
                Err(_) => {
                    return Err(TransportError::Closed {
                        reason: "open abandoned".to_string(),
                    })
                }
            }
        }

        let (outbound_tx, mut outbound_rx) = mpsc::channel(self.outbound_capacity);
        let (handle, cancel) = TransportHandle::new(outbound_tx);
        *connection.handle.lock() = Some(handle.clone());

        let sent = Arc::clone(&connection.sent);
        let sent_total = Arc::clone(&connection.sent_total);
        let frames_received = Arc::clone(&self.frames_received);
        let recording = self.recording;
        let responder = self.responder.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    frame = outbound_rx.recv() => {
                        let Some(frame) = frame else { break };
                        let reply = responder.as_ref().and_then(|respond| respond(&frame));
                        sent_total.fetch_add(1, Ordering::Relaxed);
                        frames_received.fetch_add(1, Ordering::Relaxed);
                        if recording {
                            sent.lock().push(frame);
                        }
                        if let Some(reply) = reply {
                            if events.send(TransportEvent::Message(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(handle)
    }
}

/// One recorded open attempt and, once opened, its connection
#[derive(Clone)]
pub struct MockConnection {
    index: usize,
    params: EndpointParams,
    events: mpsc::Sender<TransportEvent>,
    handle: Arc<Mutex<Option<TransportHandle>>>,
    sent: Arc<Mutex<Vec<OutboundFrame>>>,
    sent_total: Arc<AtomicUsize>,
    gate: Arc<Mutex<Option<Gate>>>,
}

impl MockConnection {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn params(&self) -> &EndpointParams {
        &self.params
    }

    /// Let a pending manual open succeed
    pub fn release(&self) -> bool {
        match self.gate.lock().take() {
            Some(gate) => gate.send(Ok(())).is_ok(),
            None => false,
        }
    }

    /// Fail a pending manual open
    pub fn reject(&self, error: TransportError) -> bool {
        match self.gate.lock().take() {
            Some(gate) => gate.send(Err(error)).is_ok(),
            None => false,
        }
    }

    /// Deliver an inbound message as if the server sent it
    pub async fn push_message(&self, payload: &str) -> bool {
        self.events
            .send(TransportEvent::Message(payload.as_bytes().to_vec()))
            .await
            .is_ok()
    }

    /// Simulate the server dropping the connection
    pub async fn drop_connection(&self, reason: &str) -> bool {
        if let Some(handle) = self.handle() {
            handle.mark_closed();
        }
        self.events
            .send(TransportEvent::Closed {
                reason: reason.to_string(),
            })
            .await
            .is_ok()
    }

    pub fn handle(&self) -> Option<TransportHandle> {
        self.handle.lock().clone()
    }

    pub fn is_open(&self) -> bool {
        self.handle().map(|h| h.is_open()).unwrap_or(false)
    }

    pub fn sent_frames(&self) -> Vec<OutboundFrame> {
        self.sent.lock().clone()
    }

    /// Frames received on this connection, recorded or not
    pub fn sent_count(&self) -> usize {
        self.sent_total.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnection")
            .field("index", &self.index)
            .field("params", &self.params)
            .field("open", &self.is_open())
            .field("sent", &self.sent_count())
            .finish()
    }
}
