//! HTTP collaborators on the inference host and the speech output

mod health;
mod speech;
mod translator;

pub use health::check_server_health;
pub use speech::{LogSpeechSink, RecordingSpeechSink, SpeechSink};
pub use translator::{HttpTranslator, PassthroughTranslator, Translator};
