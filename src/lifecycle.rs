use crate::error::SessionError;
use crate::session::{SessionController, SessionSnapshot, SessionState, StreamingConfig};
use tracing::{debug, info};

/// Host application and screen signals
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleSignal {
    AppForeground,
    AppBackground,
    ScreenFocus,
    ScreenBlur,
    ConfigChange(StreamingConfig),
}

/// Maps lifecycle signals onto session controller operations
pub struct LifecycleCoordinator {
    controller: SessionController,
    config: StreamingConfig,
    app_active: bool,
    screen_focused: bool,
}

impl LifecycleCoordinator {
    /// Starts out foregrounded and unfocused; nothing streams until the screen gains focus
    pub fn new(controller: SessionController, config: StreamingConfig) -> Self {
        Self {
            controller,
            config,
            app_active: true,
            screen_focused: false,
        }
    }

    pub async fn handle(&mut self, signal: LifecycleSignal) -> Result<(), SessionError> {
        debug!("Lifecycle signal: {:?}", signal);
        match signal {
            LifecycleSignal::AppForeground => self.on_app_foreground().await,
            LifecycleSignal::AppBackground => self.on_app_background().await,
            LifecycleSignal::ScreenFocus => self.on_screen_focus().await,
            LifecycleSignal::ScreenBlur => self.on_screen_blur().await,
            LifecycleSignal::ConfigChange(config) => self.on_config_change(config).await,
        }
    }

    pub async fn on_app_foreground(&mut self) -> Result<(), SessionError> {
        self.app_active = true;
        if let Some(generation) = self.controller.resume().await? {
            info!("Resumed streaming as session {}", generation);
        }
        Ok(())
    }

    pub async fn on_app_background(&mut self) -> Result<(), SessionError> {
        self.app_active = false;
        self.controller.suspend().await
    }

    /// Enable capture, and start a session if nothing is running or about to reconnect
    pub async fn on_screen_focus(&mut self) -> Result<(), SessionError> {
        self.screen_focused = true;
        self.controller.set_processing_enabled(true).await?;

        let snapshot = self.controller.snapshot();
        if self.app_active && snapshot.state == SessionState::Idle && !snapshot.reconnecting {
            self.controller.start(self.config.clone()).await?;
        }
        Ok(())
    }

    pub async fn on_screen_blur(&mut self) -> Result<(), SessionError> {
        self.screen_focused = false;
        self.controller.set_processing_enabled(false).await
    }

    /// Restart with `config`. While backgrounded the config is stored and applied on resume.
    pub async fn on_config_change(&mut self, config: StreamingConfig) -> Result<(), SessionError> {
        let config = config.validated()?;
        self.config = config.clone();

        if self.app_active {
            self.controller.start(config).await?;
        } else {
            self.controller.update_config(config).await?;
        }
        Ok(())
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn is_app_active(&self) -> bool {
        self.app_active
    }

    pub fn is_screen_focused(&self) -> bool {
        self.screen_focused
    }

    pub fn is_reconnecting(&self) -> bool {
        self.controller.is_reconnecting()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.controller.snapshot()
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::events::EventBus;
    use crate::source::StaticFrameSource;
    use crate::transport::MockTransport;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    fn coordinator(transport: Arc<MockTransport>) -> LifecycleCoordinator {
        let controller = SessionController::builder()
            .transport(transport)
            .frame_source(Arc::new(StaticFrameSource::placeholder_jpeg()))
            .event_bus(Arc::new(EventBus::new(32)))
            .build()
            .unwrap();
        LifecycleCoordinator::new(controller, StreamingConfig::new("en"))
    }

    async fn wait_for_state(coordinator: &LifecycleCoordinator, state: SessionState) {
        let mut snapshots = coordinator.controller().subscribe();
        timeout(Duration::from_secs(30), snapshots.wait_for(|s| s.state == state))
            .await
            .expect("timed out waiting for state")
            .expect("controller stopped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_starts_session_once() {
        let transport = Arc::new(MockTransport::new());
        let mut coordinator = coordinator(Arc::clone(&transport));

        coordinator.handle(LifecycleSignal::ScreenFocus).await.unwrap();
        wait_for_state(&coordinator, SessionState::Open).await;

        coordinator.handle(LifecycleSignal::ScreenBlur).await.unwrap();
        coordinator.handle(LifecycleSignal::ScreenFocus).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.attempts(), 1);
        assert!(coordinator.snapshot().processing_enabled);
        assert!(coordinator.is_screen_focused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_during_pending_reconnect_does_not_start() {
        let transport = Arc::new(MockTransport::new());
        let mut coordinator = coordinator(Arc::clone(&transport));

        coordinator.on_screen_focus().await.unwrap();
        wait_for_state(&coordinator, SessionState::Open).await;
        transport.connection(0).unwrap().drop_connection("gone").await;

        let mut snapshots = coordinator.controller().subscribe();
        timeout(Duration::from_secs(1), snapshots.wait_for(|s| s.reconnecting))
            .await
            .unwrap()
            .unwrap();
        assert!(coordinator.is_reconnecting());

        coordinator.on_screen_blur().await.unwrap();
        coordinator.on_screen_focus().await.unwrap();
        assert_eq!(transport.attempts(), 1);

        // The scheduled reconnect still happens
        transport.wait_for_attempts(2).await;
        wait_for_state(&coordinator, SessionState::Open).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_and_foreground() {
        let transport = Arc::new(MockTransport::new());
        let mut coordinator = coordinator(Arc::clone(&transport));

        coordinator.on_screen_focus().await.unwrap();
        wait_for_state(&coordinator, SessionState::Open).await;

        coordinator.handle(LifecycleSignal::AppBackground).await.unwrap();
        assert_eq!(coordinator.snapshot().state, SessionState::Suspended);
        assert!(!coordinator.is_app_active());

        coordinator.handle(LifecycleSignal::AppForeground).await.unwrap();
        wait_for_state(&coordinator, SessionState::Open).await;
        assert_eq!(transport.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_change_restarts_with_new_language() {
        let transport = Arc::new(MockTransport::new());
        let mut coordinator = coordinator(Arc::clone(&transport));

        coordinator.on_screen_focus().await.unwrap();
        wait_for_state(&coordinator, SessionState::Open).await;

        let hindi = coordinator.config().with_target_language("hi");
        coordinator
            .handle(LifecycleSignal::ConfigChange(hindi))
            .await
            .unwrap();
        transport.wait_for_attempts(2).await;

        assert_eq!(
            transport.connection(1).unwrap().params().target_language,
            "hi"
        );
        assert_eq!(coordinator.config().target_language(), "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_change_while_backgrounded_applies_on_resume() {
        let transport = Arc::new(MockTransport::new());
        let mut coordinator = coordinator(Arc::clone(&transport));

        coordinator.on_screen_focus().await.unwrap();
        wait_for_state(&coordinator, SessionState::Open).await;
        coordinator.on_app_background().await.unwrap();

        let french = coordinator.config().with_target_language("fr");
        coordinator.on_config_change(french).await.unwrap();
        sleep(Duration::from_millis(50)).await;
        assert_eq!(transport.attempts(), 1);

        coordinator.on_app_foreground().await.unwrap();
        transport.wait_for_attempts(2).await;
        assert_eq!(
            transport.connection(1).unwrap().params().target_language,
            "fr"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_change_is_rejected() {
        let transport = Arc::new(MockTransport::new());
        let mut coordinator = coordinator(Arc::clone(&transport));

        let bad = coordinator.config().with_target_language("not-a-language");
        let result = coordinator.on_config_change(bad).await;

        assert!(matches!(
            result,
            Err(SessionError::Config(ConfigError::InvalidLanguage { .. }))
        ));
        assert_eq!(coordinator.config().target_language(), "en");
        assert_eq!(transport.attempts(), 0);
    }
}
