use super::actor::SessionActor;
use super::reconnect::ReconnectPolicy;
use super::stats::{StatsCounters, StreamStats};
use super::types::{Generation, SessionSnapshot, SessionState, StreamingConfig};
use crate::config::NavConfig;
use crate::dispatch::ResultDispatcher;
use crate::error::{NavError, SessionError, TransportError};
use crate::events::EventBus;
use crate::source::FrameSource;
use crate::transport::{SessionTransport, TransportHandle};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::Instrument;
use uuid::Uuid;

pub(crate) enum Command {
    Start {
        config: StreamingConfig,
        reply: oneshot::Sender<Generation>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Suspend {
        reply: oneshot::Sender<()>,
    },
    Resume {
        reply: oneshot::Sender<Option<Generation>>,
    },
    SetProcessing {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    UpdateConfig {
        config: StreamingConfig,
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) enum ActorMessage {
    Command(Command),
    OpenCompleted {
        generation: Generation,
        result: Result<TransportHandle, TransportError>,
    },
    ReconnectDue {
        generation: Generation,
    },
}

/// Handle to the session controller task.
///
/// Clones talk to the same controller. Requests are applied in the order they
/// are received, one at a time, so callers never observe a half-applied transition.
#[derive(Clone)]
pub struct SessionController {
    inbox: mpsc::UnboundedSender<ActorMessage>,
    snapshot: watch::Receiver<SessionSnapshot>,
    stats: Arc<StatsCounters>,
    client_id: Uuid,
}

impl SessionController {
    pub fn builder() -> SessionControllerBuilder {
        SessionControllerBuilder::new()
    }

    /// Start streaming with `config`, superseding any current session.
    ///
    /// Invalid configs are rejected before anything changes.
    pub async fn start(&self, config: StreamingConfig) -> Result<Generation, SessionError> {
        let config = config.validated()?;
        self.request(|reply| Command::Start { config, reply }).await
    }

    /// Close the session and cancel any pending reconnect
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    /// Stop for backgrounding, remembering whether to resume
    pub async fn suspend(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Suspend { reply }).await
    }

    /// Restart the suspended session with its last config. Returns the new generation if one started.
    pub async fn resume(&self) -> Result<Option<Generation>, SessionError> {
        self.request(|reply| Command::Resume { reply }).await
    }

    /// Gate frame capture without touching the connection
    pub async fn set_processing_enabled(&self, enabled: bool) -> Result<(), SessionError> {
        self.request(|reply| Command::SetProcessing { enabled, reply })
            .await
    }

    /// Replace the stored config without starting a session
    pub async fn update_config(&self, config: StreamingConfig) -> Result<(), SessionError> {
        let config = config.validated()?;
        self.request(|reply| Command::UpdateConfig { config, reply })
            .await
    }

    /// Stop everything and end the controller task
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    pub fn is_reconnecting(&self) -> bool {
        self.snapshot.borrow().reconnecting
    }

    /// Watch every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats.snapshot()
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(ActorMessage::Command(command(reply)))
            .map_err(|_| SessionError::ControllerGone)?;
        response.await.map_err(|_| SessionError::ControllerGone)
    }
}

/// Builder for [`SessionController`]
pub struct SessionControllerBuilder {
    transport: Option<Arc<dyn SessionTransport>>,
    source: Option<Arc<dyn FrameSource>>,
    event_bus: Option<Arc<EventBus>>,
    dispatcher: Option<ResultDispatcher>,
    policy: ReconnectPolicy,
    processing_enabled: bool,
}

impl SessionControllerBuilder {
    pub fn new() -> Self {
        Self {
            transport: None,
            source: None,
            event_bus: None,
            dispatcher: None,
            policy: ReconnectPolicy::fixed(),
            processing_enabled: true,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn SessionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn frame_source(mut self, source: Arc<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn dispatcher(mut self, dispatcher: ResultDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn processing_enabled(mut self, enabled: bool) -> Self {
        self.processing_enabled = enabled;
        self
    }

    /// Spawn the controller task. Must be called from within a Tokio runtime.
    pub fn build(self) -> Result<SessionController, NavError> {
        let transport = self
            .transport
            .ok_or_else(|| NavError::component("session", "transport is required"))?;
        let source = self
            .source
            .ok_or_else(|| NavError::component("session", "frame source is required"))?;
        let event_bus = self
            .event_bus
            .ok_or_else(|| NavError::component("session", "event bus is required"))?;
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| ResultDispatcher::from_config(&NavConfig::default().proximity));

        let client_id = Uuid::new_v4();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot {
            processing_enabled: self.processing_enabled,
            ..SessionSnapshot::default()
        });
        let stats = Arc::new(StatsCounters::default());

        let actor = SessionActor::new(
            transport,
            source,
            dispatcher,
            event_bus,
            self.policy,
            inbox_rx,
            inbox_tx.downgrade(),
            snapshot_tx,
            Arc::new(AtomicBool::new(self.processing_enabled)),
            Arc::clone(&stats),
        );
        let span = tracing::info_span!("session_controller", client_id = %client_id);
        tokio::spawn(actor.run().instrument(span));

        Ok(SessionController {
            inbox: inbox_tx,
            snapshot: snapshot_rx,
            stats,
            client_id,
        })
    }
}

impl Default for SessionControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
