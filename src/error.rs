use thiserror::Error;

/// Failures of the duplex connection to the inference endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Invalid endpoint: {reason}")]
    Endpoint { reason: String },

    #[error("Connection attempt timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Transport is not open")]
    NotOpen,

    #[error("Outbound queue full, frame dropped")]
    Backpressure,

    #[error("Connection closed: {reason}")]
    Closed { reason: String },

    #[error("Protocol error: {reason}")]
    Protocol { reason: String },
}

impl TransportError {
    pub fn connect<E: Into<String>, R: ToString>(endpoint: E, reason: R) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn protocol<R: ToString>(reason: R) -> Self {
        Self::Protocol {
            reason: reason.to_string(),
        }
    }

    /// Errors where the frame was simply not accepted and the connection may still be fine
    pub fn is_frame_drop(&self) -> bool {
        matches!(self, TransportError::NotOpen | TransportError::Backpressure)
    }
}

/// Malformed inbound payloads
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Inbound payload is not valid JSON: {details}")]
    InvalidJson { details: String },

    #[error("Inbound payload is not a JSON object")]
    NotAnObject,

    #[error("Field '{field}' has an unexpected shape: {details}")]
    InvalidField { field: &'static str, details: String },
}

/// Frame capture failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CaptureError {
    #[error("Frame source unavailable: {details}")]
    Unavailable { details: String },

    #[error("Frame read failed for {path}: {details}")]
    Read { path: String, details: String },

    #[error("Captured frame is empty")]
    Empty,
}

/// Invalid streaming or application configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid language code: '{code}'")]
    InvalidLanguage { code: String },

    #[error("Invalid value for {field}: {details}")]
    InvalidValue { field: &'static str, details: String },

    #[error("Failed to load configuration: {details}")]
    Load { details: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(e: config::ConfigError) -> Self {
        ConfigError::Load {
            details: e.to_string(),
        }
    }
}

/// Session controller failures surfaced to callers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Session controller is no longer running")]
    ControllerGone,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Event bus failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },
}

#[derive(Error, Debug)]
pub enum NavError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl NavError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
