use crate::config::NarrationConfig;
use crate::dispatch::InboundEvent;
use crate::error::EventBusError;
use crate::events::{EventBus, EventFilter, NavEvent};
use crate::services::{SpeechSink, Translator};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Speaks proximity warnings, and optionally detection text, as results arrive
pub struct Narrator {
    event_bus: Arc<EventBus>,
    translator: Arc<dyn Translator>,
    speech: Arc<dyn SpeechSink>,
    config: NarrationConfig,
}

impl Narrator {
    pub fn new(
        event_bus: Arc<EventBus>,
        translator: Arc<dyn Translator>,
        speech: Arc<dyn SpeechSink>,
        config: NarrationConfig,
    ) -> Self {
        Self {
            event_bus,
            translator,
            speech,
            config,
        }
    }

    /// Subscribe now and narrate until `cancel` fires
    pub fn start(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let mut receiver = self.event_bus.subscribe_filtered(
            EventFilter::EventTypes(vec!["inbound", "proximity_warning"]),
            "narrator",
        );
        let translator = Arc::clone(&self.translator);
        let speech = Arc::clone(&self.speech);
        let config = self.config.clone();

        tokio::spawn(async move {
            info!("Narrator started");
            let mut last_announced: Option<String> = None;

            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv() => event,
                };

                match event {
                    Ok(NavEvent::ProximityWarning {
                        target_language, ..
                    }) => {
                        let warning = translator
                            .translate(&config.proximity_warning, &target_language)
                            .await;
                        speech.speak(&warning).await;
                    }
                    Ok(NavEvent::Inbound {
                        event: InboundEvent::TranslatedText(text),
                        ..
                    }) if config.announce_detections => {
                        if last_announced.as_deref() != Some(text.as_str()) {
                            speech.speak(&text).await;
                            last_announced = Some(text);
                        }
                    }
                    Ok(_) => {}
                    Err(EventBusError::Lagged { skipped }) => {
                        warn!("Narrator skipped {} events", skipped);
                    }
                    Err(e) => {
                        debug!("Narrator stopping: {}", e);
                        break;
                    }
                }
            }

            info!("Narrator stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DepthUnit;
    use crate::services::RecordingSpeechSink;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    struct TaggingTranslator;

    #[async_trait]
    impl Translator for TaggingTranslator {
        async fn translate(&self, text: &str, target_language: &str) -> String {
            format!("[{}] {}", target_language, text)
        }
    }

    fn narrator(bus: &Arc<EventBus>, speech: &Arc<RecordingSpeechSink>, announce: bool) -> Narrator {
        Narrator::new(
            Arc::clone(bus),
            Arc::new(TaggingTranslator),
            Arc::clone(speech) as Arc<dyn SpeechSink>,
            NarrationConfig {
                announce_detections: announce,
                proximity_warning: "Too close".to_string(),
            },
        )
    }

    async fn wait_for_speech(speech: &RecordingSpeechSink, count: usize) -> Vec<String> {
        timeout(Duration::from_secs(2), async {
            loop {
                let spoken = speech.spoken();
                if spoken.len() >= count {
                    return spoken;
                }
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for speech")
    }

    fn translated(text: &str) -> NavEvent {
        NavEvent::Inbound {
            generation: 1,
            event: InboundEvent::TranslatedText(text.to_string()),
            target_language: "hi".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_proximity_warning_is_translated_and_spoken() {
        let bus = Arc::new(EventBus::new(16));
        let speech = Arc::new(RecordingSpeechSink::new());
        let cancel = CancellationToken::new();
        let task = narrator(&bus, &speech, false).start(cancel.clone());

        bus.publish(NavEvent::ProximityWarning {
            generation: 1,
            depth: 30.0,
            unit: DepthUnit::Centimeters,
            target_language: "hi".to_string(),
            timestamp: Utc::now(),
        })
        .await
        .unwrap();

        assert_eq!(wait_for_speech(&speech, 1).await, vec!["[hi] Too close"]);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_detections_announced_only_on_change() {
        let bus = Arc::new(EventBus::new(16));
        let speech = Arc::new(RecordingSpeechSink::new());
        let cancel = CancellationToken::new();
        let _task = narrator(&bus, &speech, true).start(cancel.clone());

        for text in ["chair", "chair", "door"] {
            bus.publish(translated(text)).await.unwrap();
        }

        assert_eq!(wait_for_speech(&speech, 2).await, vec!["chair", "door"]);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(speech.spoken().len(), 2);
        cancel.cancel();
    }

    #[tokio::test]
    async fn test_detections_silent_by_default() {
        let bus = Arc::new(EventBus::new(16));
        let speech = Arc::new(RecordingSpeechSink::new());
        let cancel = CancellationToken::new();
        let _task = narrator(&bus, &speech, false).start(cancel.clone());

        bus.publish(translated("chair")).await.unwrap();
        sleep(Duration::from_millis(50)).await;

        assert!(speech.spoken().is_empty());
        cancel.cancel();
    }
}
