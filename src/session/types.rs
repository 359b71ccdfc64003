use crate::error::ConfigError;
use crate::frame::FrameEncoding;
use crate::language::validate_language_code;
use serde::Serialize;
use std::time::Duration;

/// Monotonically increasing session id. Each connect attempt gets a fresh one.
pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Suspended,
}

impl SessionState {
    /// A connection exists or is being established
    pub fn is_active(self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Open)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closing => "closing",
            SessionState::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Query parameters identifying what the server should do with a stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointParams {
    pub target_language: String,
    pub source_language: Option<String>,
}

impl EndpointParams {
    pub fn new<S: Into<String>>(target_language: S) -> Self {
        Self {
            target_language: target_language.into(),
            source_language: None,
        }
    }

    pub fn with_source<S: Into<String>>(mut self, source_language: S) -> Self {
        self.source_language = Some(source_language.into());
        self
    }
}

/// Everything needed to run one streaming session
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingConfig {
    pub endpoint: EndpointParams,
    pub frame_interval: Duration,
    pub frame_quality: f32,
    pub reconnect_backoff: Duration,
    pub frame_encoding: FrameEncoding,
}

impl StreamingConfig {
    /// Defaults: 200ms frame interval, quality 0.5, 2s reconnect backoff, base64 text frames
    pub fn new<S: Into<String>>(target_language: S) -> Self {
        Self {
            endpoint: EndpointParams::new(target_language),
            frame_interval: Duration::from_millis(200),
            frame_quality: 0.5,
            reconnect_backoff: Duration::from_millis(2000),
            frame_encoding: FrameEncoding::Base64,
        }
    }

    pub fn target_language(&self) -> &str {
        &self.endpoint.target_language
    }

    /// Same config streaming into another language
    pub fn with_target_language<S: Into<String>>(&self, target_language: S) -> Self {
        let mut config = self.clone();
        config.endpoint.target_language = target_language.into();
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clone().validated().map(|_| ())
    }

    /// Validate and normalize language codes to lowercase
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.endpoint.target_language = validate_language_code(&self.endpoint.target_language)?;
        if let Some(source) = self.endpoint.source_language.take() {
            self.endpoint.source_language = Some(validate_language_code(&source)?);
        }

        if self.frame_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "frame_interval",
                details: "must be greater than 0".to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.frame_quality) {
            return Err(ConfigError::InvalidValue {
                field: "frame_quality",
                details: format!("must be within 0.0..=1.0, got {}", self.frame_quality),
            });
        }

        if self.reconnect_backoff.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "reconnect_backoff",
                details: "must be greater than 0".to_string(),
            });
        }

        Ok(self)
    }
}

/// Point-in-time view of the controller, published on every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub generation: Generation,
    pub state: SessionState,
    pub target_language: Option<String>,
    pub processing_enabled: bool,
    pub reconnecting: bool,
    pub reconnect_attempts: u32,
    pub resume_pending: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            generation: 0,
            state: SessionState::Idle,
            target_language: None,
            processing_enabled: true,
            reconnecting: false,
            reconnect_attempts: 0,
            resume_pending: false,
        }
    }
}
