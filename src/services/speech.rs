use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

/// Output for spoken narration
#[async_trait]
pub trait SpeechSink: Send + Sync {
    async fn speak(&self, text: &str);
}

/// Writes utterances to the log instead of a speech engine
pub struct LogSpeechSink;

#[async_trait]
impl SpeechSink for LogSpeechSink {
    async fn speak(&self, text: &str) {
        info!(target: "navstream::speech", "{}", text);
    }
}

/// Keeps every utterance in memory
#[derive(Default)]
pub struct RecordingSpeechSink {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeechSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

#[async_trait]
impl SpeechSink for RecordingSpeechSink {
    async fn speak(&self, text: &str) {
        self.spoken.lock().push(text.to_string());
    }
}
