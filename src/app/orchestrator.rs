use super::keyboard_input::{KeyCommand, KeyboardInputHandler};
use super::types::{ComponentState, ShutdownReason};
use crate::config::NavConfig;
use crate::dispatch::ResultDispatcher;
use crate::error::{NavError, Result};
use crate::events::{EventBus, EventFilter, EventReceiver};
use crate::frame::OutboundFrame;
use crate::lifecycle::LifecycleCoordinator;
use crate::narration::Narrator;
use crate::services::{HttpTranslator, LogSpeechSink, PassthroughTranslator, SpeechSink, Translator};
use crate::session::{ReconnectPolicy, SessionController};
use crate::source::{DirectoryFrameSource, FrameSource, StaticFrameSource};
use crate::transport::{MockTransport, SessionTransport, WebSocketTransport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Pluggable collaborators of the application
pub struct AppComponents {
    pub transport: Arc<dyn SessionTransport>,
    pub source: Arc<dyn FrameSource>,
    pub translator: Arc<dyn Translator>,
    pub speech: Arc<dyn SpeechSink>,
    /// Probe the server's health endpoint during initialization
    pub check_health: bool,
}

impl AppComponents {
    /// Real server connection, frames replayed from `source.frames_dir`
    pub fn from_config(config: &NavConfig) -> Result<Self> {
        let source = DirectoryFrameSource::open(&config.source.frames_dir)?;
        let translator = HttpTranslator::new(
            config.http_base_url(),
            Duration::from_millis(config.server.connect_timeout_ms),
        )
        .map_err(|e| NavError::component("translator", e.to_string()))?;

        Ok(Self {
            transport: Arc::new(WebSocketTransport::new(
                &config.server,
                config.system.outbound_queue_capacity,
            )),
            source: Arc::new(source),
            translator: Arc::new(translator),
            speech: Arc::new(LogSpeechSink),
            check_health: true,
        })
    }

    /// In-process server answering every frame with a canned result
    pub fn dry_run() -> Self {
        Self {
            transport: Arc::new(Self::dry_run_transport()),
            source: Arc::new(StaticFrameSource::placeholder_jpeg()),
            translator: Arc::new(PassthroughTranslator),
            speech: Arc::new(LogSpeechSink),
            check_health: false,
        }
    }

    /// Runs for as long as the app does, so nothing is recorded beyond counters
    pub(super) fn dry_run_transport() -> MockTransport {
        MockTransport::new().without_recording().with_responder(|frame: &OutboundFrame| {
            let reply = serde_json::json!({
                "translated_text": format!("dry run frame ({} bytes)", frame.len()),
                "depth": 120.0,
            });
            Some(reply.to_string().into_bytes())
        })
    }
}

/// Wires the session controller, lifecycle coordinator and narrator together
pub struct NavigatorApp {
    pub(super) config: NavConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) controller: SessionController,
    pub(super) coordinator: LifecycleCoordinator,
    pub(super) narrator: Narrator,
    pub(super) narrator_task: Option<JoinHandle<()>>,
    pub(super) http_client: reqwest::Client,
    pub(super) check_health: bool,

    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,
    pub(super) key_commands: Option<mpsc::Receiver<KeyCommand>>,
    pub(super) shutdown_events: Option<EventReceiver>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl NavigatorApp {
    pub async fn new(config: NavConfig, components: AppComponents) -> Result<Self> {
        config.validate()?;

        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let controller = SessionController::builder()
            .transport(components.transport)
            .frame_source(components.source)
            .event_bus(Arc::clone(&event_bus))
            .dispatcher(ResultDispatcher::from_config(&config.proximity))
            .reconnect_policy(ReconnectPolicy::from_config(&config.stream))
            .processing_enabled(false)
            .build()?;
        info!("Session controller {} created", controller.client_id());

        let coordinator = LifecycleCoordinator::new(controller.clone(), config.streaming_config());
        let narrator = Narrator::new(
            Arc::clone(&event_bus),
            components.translator,
            components.speech,
            config.narration.clone(),
        );

        let (key_sender, key_receiver) = mpsc::channel(16);
        let shutdown_events = event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "app",
        );
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        Ok(Self {
            config,
            event_bus,
            controller,
            coordinator,
            narrator,
            narrator_task: None,
            http_client: reqwest::Client::new(),
            check_health: components.check_health,
            keyboard_handler: Some(KeyboardInputHandler::new(key_sender)),
            keyboard_enabled: false,
            key_commands: Some(key_receiver),
            shutdown_events: Some(shutdown_events),
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the interactive keyboard controls
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn coordinator(&self) -> &LifecycleCoordinator {
        &self.coordinator
    }
}
