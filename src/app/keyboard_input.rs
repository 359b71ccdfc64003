use crate::error::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consecutive poll failures tolerated before the handler gives up on the terminal
const MAX_POLL_ERRORS: u32 = 10;

/// Wait before polling again after `consecutive` failures, or `None` to stop
fn poll_error_delay(consecutive: u32) -> Option<Duration> {
    if consecutive >= MAX_POLL_ERRORS {
        return None;
    }
    Some(Duration::from_millis(100 * u64::from(consecutive.max(1))).min(Duration::from_secs(1)))
}

/// Interactive stand-ins for host lifecycle signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Focus,
    Blur,
    Background,
    Foreground,
    CycleLanguage,
    Quit,
}

impl KeyCommand {
    pub fn from_key(code: KeyCode) -> Option<Self> {
        match code {
            KeyCode::Char('f') => Some(KeyCommand::Focus),
            KeyCode::Char('b') => Some(KeyCommand::Blur),
            KeyCode::Char('g') => Some(KeyCommand::Background),
            KeyCode::Char('r') => Some(KeyCommand::Foreground),
            KeyCode::Char('l') => Some(KeyCommand::CycleLanguage),
            KeyCode::Char('q') | KeyCode::Esc => Some(KeyCommand::Quit),
            _ => None,
        }
    }
}

/// Reads key presses from the terminal in raw mode and forwards them as [`KeyCommand`]s
pub struct KeyboardInputHandler {
    commands: mpsc::Sender<KeyCommand>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(commands: mpsc::Sender<KeyCommand>) -> Self {
        Self {
            commands,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub async fn start(&self) -> Result<()> {
        info!("Keyboard controls: f/b focus/blur, g/r background/foreground, l language, q quit");

        let commands = self.commands.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            let mut poll_errors = 0;
            while !cancellation_token.is_cancelled() {
                let polled = event::poll(Duration::from_millis(100));
                if polled.is_ok() {
                    poll_errors = 0;
                }

                match polled {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        let Some(command) = KeyCommand::from_key(key_event.code) else {
                            debug!("Unmapped key: {:?}", key_event.code);
                            continue;
                        };

                        info!("Key command: {:?}", command);
                        if commands.blocking_send(command).is_err() || command == KeyCommand::Quit {
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        poll_errors += 1;
                        warn!("Error polling for keyboard events: {}", e);
                        match poll_error_delay(poll_errors) {
                            Some(delay) => std::thread::sleep(delay),
                            None => {
                                error!("Keyboard input disabled after {} poll errors", poll_errors);
                                break;
                            }
                        }
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // One poll interval for the blocking task to restore the terminal
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}
