use super::{KeyCommand, NavigatorApp, ShutdownReason};
use crate::error::{NavError, Result};
use crate::events::NavEvent;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

impl NavigatorApp {
    /// Run until a signal, a quit key or a `ShutdownRequested` event, then shut down
    pub async fn run(&mut self) -> Result<i32> {
        info!("Navigation client is running");

        let shutdown_sender = self
            .shutdown_sender
            .take()
            .ok_or_else(|| NavError::system("Shutdown sender already taken"))?;
        let mut shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| NavError::system("Shutdown receiver already taken"))?;
        let mut key_commands = self.key_commands.take();
        let mut shutdown_events = self.shutdown_events.take();

        self.setup_signal_handlers(shutdown_sender);

        let shutdown_reason = loop {
            tokio::select! {
                reason = &mut shutdown_receiver => {
                    break reason.map_err(|_| NavError::system("Shutdown channel closed unexpectedly"))?;
                }
                Some(command) = async { key_commands.as_mut()?.recv().await } => {
                    if let Some(reason) = self.apply_key_command(command).await {
                        break reason;
                    }
                }
                event = async {
                    match shutdown_events.as_mut() {
                        Some(events) => events.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match event {
                        Ok(NavEvent::ShutdownRequested { reason, .. }) => {
                            break ShutdownReason::Error(reason);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Shutdown event subscription ended: {}", e);
                            shutdown_events = None;
                        }
                    }
                }
            }
        };

        info!("Shutdown initiated: {}", shutdown_reason);
        let exit_code = self.shutdown().await?;

        info!("Navigation client shutdown complete");
        Ok(exit_code)
    }

    /// Translate a key press into a lifecycle signal. Returns a reason when the key quits.
    pub(super) async fn apply_key_command(&mut self, command: KeyCommand) -> Option<ShutdownReason> {
        let result = match command {
            KeyCommand::Focus => self.coordinator.on_screen_focus().await,
            KeyCommand::Blur => self.coordinator.on_screen_blur().await,
            KeyCommand::Background => self.coordinator.on_app_background().await,
            KeyCommand::Foreground => self.coordinator.on_app_foreground().await,
            KeyCommand::CycleLanguage => {
                let language = self.next_language();
                info!("Switching target language to {}", language);
                let config = self.coordinator.config().with_target_language(language);
                self.coordinator.on_config_change(config).await
            }
            KeyCommand::Quit => return Some(ShutdownReason::UserRequest),
        };

        if let Err(e) = result {
            error!("Key command {:?} failed: {}", command, e);
        }
        None
    }

    /// The configured language after the current target, wrapping around
    pub(super) fn next_language(&self) -> String {
        let languages = &self.config.stream.languages;
        let current = self.coordinator.config().target_language();

        let next = languages
            .iter()
            .position(|language| language == current)
            .map(|index| (index + 1) % languages.len())
            .unwrap_or(0);

        languages
            .get(next)
            .cloned()
            .unwrap_or_else(|| current.to_string())
    }

    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
