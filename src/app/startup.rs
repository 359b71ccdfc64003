use super::{ComponentState, NavigatorApp};
use crate::error::Result;
use crate::services::check_server_health;
use tracing::{error, info, warn};

impl NavigatorApp {
    /// Register components and probe the inference server
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing navigation client");

        self.set_component_state("session", ComponentState::Stopped)
            .await;
        self.set_component_state("narrator", ComponentState::Stopped)
            .await;
        if self.keyboard_enabled {
            self.set_component_state("keyboard", ComponentState::Stopped)
                .await;
        }

        if self.check_health {
            let base_url = self.config.http_base_url();
            if check_server_health(&self.http_client, &base_url).await {
                info!("Inference server at {} is healthy", base_url);
            } else {
                // The session keeps reconnecting, so a server that is still starting is not fatal
                warn!("Inference server at {} is not healthy yet", base_url);
            }
        }

        info!("Navigation client initialized");
        Ok(())
    }

    /// Start narration and streaming, as if the screen just gained focus
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting navigation client");

        self.set_component_state("narrator", ComponentState::Starting)
            .await;
        self.narrator_task = Some(self.narrator.start(self.cancellation_token.child_token()));
        self.set_component_state("narrator", ComponentState::Running)
            .await;

        self.set_component_state("session", ComponentState::Starting)
            .await;
        self.coordinator.on_screen_focus().await.map_err(|e| {
            error!("Failed to start streaming: {}", e);
            e
        })?;
        self.set_component_state("session", ComponentState::Running)
            .await;
        info!(
            "Streaming to {} (target language {})",
            self.config.server.host,
            self.coordinator.config().target_language()
        );

        if self.keyboard_enabled {
            if let Some(keyboard_handler) = &self.keyboard_handler {
                self.set_component_state("keyboard", ComponentState::Starting)
                    .await;
                keyboard_handler.start().await?;
                self.set_component_state("keyboard", ComponentState::Running)
                    .await;
            }
        }

        info!("Navigation client started");
        Ok(())
    }
}
