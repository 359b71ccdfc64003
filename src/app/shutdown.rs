use super::{ComponentState, NavigatorApp};
use crate::error::{NavError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

impl NavigatorApp {
    /// Stop all components, returning the process exit code
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = 0;

        if self.keyboard_enabled {
            if let Some(keyboard_handler) = self.keyboard_handler.take() {
                let stop = async move { keyboard_handler.stop().await };
                if let Err(e) = self.stop_component("keyboard", Duration::from_secs(2), stop).await {
                    error!("Error stopping keyboard: {}", e);
                    exit_code = 1;
                }
            }
        }

        let controller = self.controller.clone();
        let stop = async move { controller.shutdown().await.map_err(NavError::from) };
        if let Err(e) = self.stop_component("session", Duration::from_secs(5), stop).await {
            error!("Error stopping session: {}", e);
            exit_code = 1;
        }

        // The narrator exits on its own once the root token is cancelled
        let narrator_task = self.narrator_task.take();
        let stop = async move {
            if let Some(task) = narrator_task {
                task.await
                    .map_err(|e| NavError::component("narrator", e.to_string()))?;
            }
            Ok::<(), NavError>(())
        };
        if let Err(e) = self.stop_component("narrator", Duration::from_secs(2), stop).await {
            error!("Error stopping narrator: {}", e);
            exit_code = 1;
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_component<F>(&self, component: &str, limit: Duration, stop: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(limit, stop).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(e)
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(NavError::component(component, "stop timeout"))
            }
        }
    }
}
