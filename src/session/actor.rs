use super::controller::{ActorMessage, Command};
use super::pump::FramePump;
use super::reconnect::ReconnectPolicy;
use super::stats::StatsCounters;
use super::types::{Generation, SessionSnapshot, SessionState, StreamingConfig};
use crate::dispatch::{Dispatch, ProximityChanged, ResultDispatcher};
use crate::error::TransportError;
use crate::events::{EventBus, NavEvent};
use crate::source::FrameSource;
use crate::transport::{SessionTransport, TransportEvent, TransportHandle};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Buffered inbound events per connection
const INBOUND_CAPACITY: usize = 32;

struct SessionEvents {
    generation: Generation,
    rx: mpsc::Receiver<TransportEvent>,
}

struct ActiveSession {
    generation: Generation,
    config: StreamingConfig,
    handle: Option<TransportHandle>,
    pump: Option<CancellationToken>,
}

struct PendingReconnect {
    generation: Generation,
    cancel: CancellationToken,
}

enum Step {
    Message(Option<ActorMessage>),
    Transport(Generation, Option<TransportEvent>),
}

/// Owns all session state. Every transition happens on this task.
pub(crate) struct SessionActor {
    transport: Arc<dyn SessionTransport>,
    source: Arc<dyn FrameSource>,
    dispatcher: ResultDispatcher,
    event_bus: Arc<EventBus>,
    policy: ReconnectPolicy,
    inbox: mpsc::UnboundedReceiver<ActorMessage>,
    inbox_tx: mpsc::WeakUnboundedSender<ActorMessage>,
    snapshot: watch::Sender<SessionSnapshot>,
    processing: Arc<AtomicBool>,
    stats: Arc<StatsCounters>,
    current_generation: Arc<AtomicU64>,
    state: SessionState,
    config: Option<StreamingConfig>,
    resume_intent: bool,
    reconnecting: bool,
    reconnect_attempts: u32,
    session: Option<ActiveSession>,
    session_events: Option<SessionEvents>,
    reconnect: Option<PendingReconnect>,
}

impl SessionActor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn SessionTransport>,
        source: Arc<dyn FrameSource>,
        dispatcher: ResultDispatcher,
        event_bus: Arc<EventBus>,
        policy: ReconnectPolicy,
        inbox: mpsc::UnboundedReceiver<ActorMessage>,
        inbox_tx: mpsc::WeakUnboundedSender<ActorMessage>,
        snapshot: watch::Sender<SessionSnapshot>,
        processing: Arc<AtomicBool>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self {
            transport,
            source,
            dispatcher,
            event_bus,
            policy,
            inbox,
            inbox_tx,
            snapshot,
            processing,
            stats,
            current_generation: Arc::new(AtomicU64::new(0)),
            state: SessionState::Idle,
            config: None,
            resume_intent: false,
            reconnecting: false,
            reconnect_attempts: 0,
            session: None,
            session_events: None,
            reconnect: None,
        }
    }

    pub async fn run(mut self) {
        info!("Session controller started");
        let mut shutdown_reply: Option<oneshot::Sender<()>> = None;

        loop {
            let step = tokio::select! {
                message = self.inbox.recv() => Step::Message(message),
                (generation, event) = next_transport_event(&mut self.session_events) => {
                    Step::Transport(generation, event)
                }
            };

            match step {
                Step::Message(None) => {
                    debug!("All controller handles dropped");
                    break;
                }
                Step::Message(Some(ActorMessage::Command(Command::Shutdown { reply }))) => {
                    shutdown_reply = Some(reply);
                    break;
                }
                Step::Message(Some(message)) => self.handle_message(message).await,
                Step::Transport(generation, Some(event)) => {
                    self.handle_transport_event(generation, event).await
                }
                Step::Transport(generation, None) => self.handle_events_ended(generation).await,
            }
        }

        self.stop().await;
        info!("Session controller stopped");
        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    fn current_generation(&self) -> Generation {
        self.current_generation.load(Ordering::Acquire)
    }

    fn next_generation(&self) -> Generation {
        self.current_generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn is_current_session(&self, generation: Generation) -> bool {
        matches!(&self.session, Some(session) if session.generation == generation)
            && generation == self.current_generation()
    }

    async fn handle_message(&mut self, message: ActorMessage) {
        match message {
            ActorMessage::Command(command) => self.handle_command(command).await,
            ActorMessage::OpenCompleted { generation, result } => {
                self.handle_open_completed(generation, result).await
            }
            ActorMessage::ReconnectDue { generation } => self.handle_reconnect_due(generation).await,
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { config, reply } => {
                let generation = self.start_session(config, true).await;
                let _ = reply.send(generation);
            }
            Command::Stop { reply } => {
                self.stop().await;
                let _ = reply.send(());
            }
            Command::Suspend { reply } => {
                self.suspend().await;
                let _ = reply.send(());
            }
            Command::Resume { reply } => {
                let generation = self.resume().await;
                let _ = reply.send(generation);
            }
            Command::SetProcessing { enabled, reply } => {
                self.processing.store(enabled, Ordering::Release);
                info!(
                    "Frame processing {}",
                    if enabled { "enabled" } else { "disabled" }
                );
                self.publish_snapshot();
                let _ = reply.send(());
            }
            Command::UpdateConfig { config, reply } => {
                debug!(
                    "Stored config for target={} without restarting",
                    config.target_language()
                );
                self.config = Some(config);
                self.publish_snapshot();
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                // Handled by the run loop
                let _ = reply.send(());
            }
        }
    }

    /// Supersede whatever is running with a new session for `config`
    async fn start_session(&mut self, config: StreamingConfig, user_initiated: bool) -> Generation {
        self.cancel_reconnect();
        let generation = self.next_generation();
        self.close_session().await;

        if user_initiated {
            self.reconnect_attempts = 0;
            self.reconnecting = false;
            self.dispatcher.reset();
        }
        self.resume_intent = false;

        info!(
            "Starting session {} (target={})",
            generation,
            config.target_language()
        );

        let (events_tx, events_rx) = mpsc::channel(INBOUND_CAPACITY);
        self.session_events = Some(SessionEvents {
            generation,
            rx: events_rx,
        });
        self.session = Some(ActiveSession {
            generation,
            config: config.clone(),
            handle: None,
            pump: None,
        });
        self.config = Some(config.clone());
        self.transition(generation, SessionState::Connecting).await;

        let transport = Arc::clone(&self.transport);
        let inbox = self.inbox_tx.clone();
        let params = config.endpoint;
        tokio::spawn(async move {
            let result = transport.open(&params, events_tx).await;
            let undelivered = match inbox.upgrade() {
                Some(inbox) => inbox
                    .send(ActorMessage::OpenCompleted { generation, result })
                    .err()
                    .map(|e| e.0),
                None => Some(ActorMessage::OpenCompleted { generation, result }),
            };
            // Controller is gone, nobody will ever close this connection otherwise
            if let Some(ActorMessage::OpenCompleted {
                result: Ok(handle), ..
            }) = undelivered
            {
                handle.close();
            }
        });

        generation
    }

    /// Tear down the current session, if any, ending in `Idle`
    async fn close_session(&mut self) {
        self.session_events = None;
        let Some(session) = self.session.take() else {
            return;
        };

        self.transition(session.generation, SessionState::Closing)
            .await;
        if let Some(pump) = session.pump {
            pump.cancel();
        }
        if let Some(handle) = session.handle {
            handle.close();
        }
        self.transition(session.generation, SessionState::Idle).await;
    }

    async fn handle_open_completed(
        &mut self,
        generation: Generation,
        result: Result<TransportHandle, TransportError>,
    ) {
        if !self.is_current_session(generation) || self.state != SessionState::Connecting {
            if let Ok(handle) = result {
                debug!("Closing connection of superseded session {}", generation);
                handle.close();
            }
            return;
        }

        let handle = match result {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Session {} failed to connect: {}", generation, e);
                self.connection_lost(generation, e.to_string()).await;
                return;
            }
        };

        self.reconnect_attempts = 0;
        self.reconnecting = false;
        info!("Session {} open", generation);
        self.transition(generation, SessionState::Open).await;

        let Some(session) = self.session.as_mut() else {
            handle.close();
            return;
        };
        let cancel = CancellationToken::new();
        FramePump {
            generation,
            current_generation: Arc::clone(&self.current_generation),
            handle: handle.clone(),
            source: Arc::clone(&self.source),
            processing: Arc::clone(&self.processing),
            stats: Arc::clone(&self.stats),
            interval: session.config.frame_interval,
            quality: session.config.frame_quality,
            encoding: session.config.frame_encoding,
            cancel: cancel.clone(),
        }
        .spawn();
        session.handle = Some(handle);
        session.pump = Some(cancel);
    }

    async fn handle_transport_event(&mut self, generation: Generation, event: TransportEvent) {
        if !self.is_current_session(generation) {
            trace!("Dropping event of superseded session {}", generation);
            return;
        }

        match event {
            TransportEvent::Message(raw) => {
                if self.state != SessionState::Open {
                    return;
                }
                self.stats.record_message();
                match self.dispatcher.on_message(&raw) {
                    Ok(mut dispatch) => {
                        for error in dispatch.field_errors.drain(..) {
                            warn!("Ignoring malformed field: {}", error);
                            self.stats.record_parse_error();
                        }
                        self.publish_dispatch(generation, dispatch).await
                    }
                    Err(e) => {
                        warn!("Ignoring malformed message: {}", e);
                        self.stats.record_parse_error();
                    }
                }
            }
            TransportEvent::Closed { reason } => self.connection_lost(generation, reason).await,
            TransportEvent::Error(e) => self.connection_lost(generation, e.to_string()).await,
        }
    }

    async fn handle_events_ended(&mut self, generation: Generation) {
        self.session_events = None;
        if self.is_current_session(generation) && self.state == SessionState::Open {
            self.connection_lost(generation, "transport ended".to_string())
                .await;
        }
    }

    async fn publish_dispatch(&mut self, generation: Generation, dispatch: Dispatch) {
        let Some(session) = &self.session else {
            return;
        };
        let target_language = session.config.target_language().to_string();

        for event in dispatch.events {
            let _ = self
                .event_bus
                .publish(NavEvent::Inbound {
                    generation,
                    event,
                    target_language: target_language.clone(),
                    timestamp: Utc::now(),
                })
                .await;
        }

        if let Some(ProximityChanged { close: true, depth }) = dispatch.proximity {
            let _ = self
                .event_bus
                .publish(NavEvent::ProximityWarning {
                    generation,
                    depth,
                    unit: self.dispatcher.unit(),
                    target_language,
                    timestamp: Utc::now(),
                })
                .await;
        }
    }

    async fn connection_lost(&mut self, generation: Generation, reason: String) {
        warn!("Session {} lost: {}", generation, reason);
        self.close_session().await;
        self.schedule_reconnect(generation).await;
    }

    async fn schedule_reconnect(&mut self, generation: Generation) {
        if generation != self.current_generation() {
            return;
        }
        let Some(base) = self.config.as_ref().map(|c| c.reconnect_backoff) else {
            return;
        };

        self.reconnect_attempts += 1;
        let attempt = self.reconnect_attempts;

        let Some(delay) = self.policy.delay(base, attempt) else {
            warn!("Giving up after {} reconnect attempts", attempt - 1);
            self.reconnecting = false;
            self.publish_snapshot();
            let _ = self
                .event_bus
                .publish(NavEvent::SystemError {
                    component: "session".to_string(),
                    error: format!("gave up reconnecting after {} attempts", attempt - 1),
                })
                .await;
            return;
        };

        let cancel = CancellationToken::new();
        let timer_cancel = cancel.clone();
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer_cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(inbox) = inbox.upgrade() {
                        let _ = inbox.send(ActorMessage::ReconnectDue { generation });
                    }
                }
            }
        });

        self.reconnect = Some(PendingReconnect { generation, cancel });
        self.reconnecting = true;
        self.publish_snapshot();
        let _ = self
            .event_bus
            .publish(NavEvent::ReconnectScheduled {
                generation,
                attempt,
                delay_ms: delay.as_millis() as u64,
                timestamp: Utc::now(),
            })
            .await;
    }

    async fn handle_reconnect_due(&mut self, generation: Generation) {
        match &self.reconnect {
            Some(pending) if pending.generation == generation => {}
            _ => {
                trace!("Ignoring cancelled reconnect for session {}", generation);
                return;
            }
        }
        self.reconnect = None;

        if generation != self.current_generation() || self.state != SessionState::Idle {
            return;
        }
        let Some(config) = self.config.clone() else {
            return;
        };

        info!("Reconnecting (attempt {})", self.reconnect_attempts);
        self.start_session(config, false).await;
    }

    fn cancel_reconnect(&mut self) {
        if let Some(pending) = self.reconnect.take() {
            debug!("Cancelling reconnect for session {}", pending.generation);
            pending.cancel.cancel();
        }
    }

    /// Invalidate the current generation and release everything it holds
    async fn teardown(&mut self) -> Generation {
        let generation = self.next_generation();
        self.cancel_reconnect();
        self.close_session().await;
        self.reconnecting = false;
        self.reconnect_attempts = 0;
        self.dispatcher.reset();
        generation
    }

    async fn stop(&mut self) {
        let generation = self.teardown().await;
        self.resume_intent = false;
        self.transition(generation, SessionState::Idle).await;
        self.publish_snapshot();
    }

    async fn suspend(&mut self) {
        if self.state == SessionState::Suspended {
            return;
        }

        let wanted = self.session.is_some() || self.reconnect.is_some() || self.reconnecting;
        let generation = self.teardown().await;
        self.resume_intent = wanted && self.config.is_some();
        info!("Session suspended (resume pending: {})", self.resume_intent);
        self.transition(generation, SessionState::Suspended).await;
    }

    async fn resume(&mut self) -> Option<Generation> {
        if self.state != SessionState::Suspended {
            return None;
        }

        match self.config.clone() {
            Some(config) if self.resume_intent => Some(self.start_session(config, true).await),
            _ => {
                self.resume_intent = false;
                let generation = self.current_generation();
                self.transition(generation, SessionState::Idle).await;
                None
            }
        }
    }

    async fn transition(&mut self, generation: Generation, next: SessionState) {
        if self.state == next {
            return;
        }

        let previous = std::mem::replace(&mut self.state, next);
        debug!("Session {}: {} -> {}", generation, previous, next);
        self.publish_snapshot();

        let _ = self
            .event_bus
            .publish(NavEvent::SessionStateChanged {
                generation,
                previous,
                state: next,
                timestamp: Utc::now(),
            })
            .await;
    }

    fn publish_snapshot(&self) {
        self.snapshot.send_replace(SessionSnapshot {
            generation: self.current_generation(),
            state: self.state,
            target_language: self
                .config
                .as_ref()
                .map(|c| c.target_language().to_string()),
            processing_enabled: self.processing.load(Ordering::Acquire),
            reconnecting: self.reconnecting,
            reconnect_attempts: self.reconnect_attempts,
            resume_pending: self.resume_intent,
        });
    }
}

async fn next_transport_event(
    events: &mut Option<SessionEvents>,
) -> (Generation, Option<TransportEvent>) {
    match events {
        Some(events) => (events.generation, events.rx.recv().await),
        None => std::future::pending().await,
    }
}
