use crate::dispatch::DepthUnit;
use crate::error::ConfigError;
use crate::frame::FrameEncoding;
use crate::language::validate_language_code;
use crate::session::{EndpointParams, StreamingConfig};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NavConfig {
    pub server: ServerConfig,
    pub stream: StreamConfig,
    pub proximity: ProximityConfig,
    pub narration: NarrationConfig,
    pub source: SourceConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Inference server host name or address
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Inference server port (WebSocket and HTTP share it)
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// WebSocket scheme, `ws` or `wss`
    #[serde(default = "default_ws_scheme")]
    pub ws_scheme: String,

    /// HTTP scheme for the translate and health endpoints
    #[serde(default = "default_http_scheme")]
    pub http_scheme: String,

    /// Path of the frame streaming socket
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Upper bound on the WebSocket handshake
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StreamConfig {
    /// Language the server should translate detections into
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Optional source language hint sent as `source=<code>`
    #[serde(default)]
    pub source_language: Option<String>,

    /// Languages the keyboard handler cycles through
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Delay between captured frames
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Capture quality hint in 0.0..=1.0
    #[serde(default = "default_frame_quality")]
    pub frame_quality: f32,

    /// Delay before reconnecting after a dropped connection
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    /// Double the reconnect delay after each consecutive failure
    #[serde(default)]
    pub exponential_backoff: bool,

    /// Cap for the reconnect delay when exponential backoff is on
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Give up reconnecting after this many consecutive failures (unlimited when unset)
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Outbound frame encoding
    #[serde(default = "default_frame_encoding")]
    pub frame_encoding: FrameEncoding,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProximityConfig {
    /// Depth below which an object counts as close, in `unit`
    #[serde(default = "default_proximity_threshold")]
    pub threshold: f64,

    /// Unit the server reports depth in
    #[serde(default = "default_depth_unit")]
    pub unit: DepthUnit,

    /// Append the last known depth to tracked object labels
    #[serde(default = "default_annotate_tracked_objects")]
    pub annotate_tracked_objects: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NarrationConfig {
    /// Speak translated detection text whenever it changes
    #[serde(default = "default_announce_detections")]
    pub announce_detections: bool,

    /// English warning spoken on a far-to-close edge, translated before speaking
    #[serde(default = "default_proximity_warning")]
    pub proximity_warning: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SourceConfig {
    /// Directory of JPEG frames replayed as the camera feed
    #[serde(default = "default_frames_dir")]
    pub frames_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Frames allowed in flight towards the socket writer before dropping
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

impl NavConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("navstream.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("server.host", default_server_host())?
            .set_default("server.port", default_server_port())?
            .set_default("server.ws_scheme", default_ws_scheme())?
            .set_default("server.http_scheme", default_http_scheme())?
            .set_default("server.ws_path", default_ws_path())?
            .set_default("server.connect_timeout_ms", default_connect_timeout_ms())?
            .set_default("stream.target_language", default_target_language())?
            .set_default("stream.languages", default_languages())?
            .set_default("stream.frame_interval_ms", default_frame_interval_ms())?
            .set_default("stream.frame_quality", default_frame_quality() as f64)?
            .set_default(
                "stream.reconnect_backoff_ms",
                default_reconnect_backoff_ms(),
            )?
            .set_default("stream.exponential_backoff", false)?
            .set_default("stream.max_backoff_ms", default_max_backoff_ms())?
            .set_default("stream.frame_encoding", "base64")?
            .set_default("proximity.threshold", default_proximity_threshold())?
            .set_default("proximity.unit", "centimeters")?
            .set_default(
                "proximity.annotate_tracked_objects",
                default_annotate_tracked_objects(),
            )?
            .set_default(
                "narration.announce_detections",
                default_announce_detections(),
            )?
            .set_default("narration.proximity_warning", default_proximity_warning())?
            .set_default("source.frames_dir", default_frames_dir())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default(
                "system.outbound_queue_capacity",
                default_outbound_queue_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // NAVSTREAM_STREAM__TARGET_LANGUAGE=hi style overrides
            .add_source(Environment::with_prefix("NAVSTREAM").separator("__"))
            .build()?;

        let config: NavConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.host",
                details: "must not be empty".to_string(),
            });
        }

        if !matches!(self.server.ws_scheme.as_str(), "ws" | "wss") {
            return Err(ConfigError::InvalidValue {
                field: "server.ws_scheme",
                details: format!("expected ws or wss, got '{}'", self.server.ws_scheme),
            });
        }

        if !matches!(self.server.http_scheme.as_str(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "server.http_scheme",
                details: format!("expected http or https, got '{}'", self.server.http_scheme),
            });
        }

        if !self.server.ws_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "server.ws_path",
                details: "must start with '/'".to_string(),
            });
        }

        if self.server.connect_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.connect_timeout_ms",
                details: "must be greater than 0".to_string(),
            });
        }

        for code in &self.stream.languages {
            validate_language_code(code)?;
        }

        if self.stream.max_backoff_ms < self.stream.reconnect_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "stream.max_backoff_ms",
                details: "must be at least reconnect_backoff_ms".to_string(),
            });
        }

        if !self.proximity.threshold.is_finite() || self.proximity.threshold <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "proximity.threshold",
                details: "must be a positive number".to_string(),
            });
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "system.event_bus_capacity",
                details: "must be greater than 0".to_string(),
            });
        }

        if self.system.outbound_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "system.outbound_queue_capacity",
                details: "must be greater than 0".to_string(),
            });
        }

        self.streaming_config().validate()?;

        Ok(())
    }

    /// Session parameters derived from the `stream` section
    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            endpoint: EndpointParams {
                target_language: self.stream.target_language.clone(),
                source_language: self.stream.source_language.clone(),
            },
            frame_interval: Duration::from_millis(self.stream.frame_interval_ms),
            frame_quality: self.stream.frame_quality,
            reconnect_backoff: Duration::from_millis(self.stream.reconnect_backoff_ms),
            frame_encoding: self.stream.frame_encoding,
        }
    }

    /// Base URL for the HTTP collaborators on the inference host
    pub fn http_base_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.server.http_scheme, self.server.host, self.server.port
        )
    }

    /// Serialize to TOML, used by `--print-config`
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_server_host(),
                port: default_server_port(),
                ws_scheme: default_ws_scheme(),
                http_scheme: default_http_scheme(),
                ws_path: default_ws_path(),
                connect_timeout_ms: default_connect_timeout_ms(),
            },
            stream: StreamConfig {
                target_language: default_target_language(),
                source_language: None,
                languages: default_languages(),
                frame_interval_ms: default_frame_interval_ms(),
                frame_quality: default_frame_quality(),
                reconnect_backoff_ms: default_reconnect_backoff_ms(),
                exponential_backoff: false,
                max_backoff_ms: default_max_backoff_ms(),
                max_reconnect_attempts: None,
                frame_encoding: default_frame_encoding(),
            },
            proximity: ProximityConfig {
                threshold: default_proximity_threshold(),
                unit: default_depth_unit(),
                annotate_tracked_objects: default_annotate_tracked_objects(),
            },
            narration: NarrationConfig {
                announce_detections: default_announce_detections(),
                proximity_warning: default_proximity_warning(),
            },
            source: SourceConfig {
                frames_dir: default_frames_dir(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                outbound_queue_capacity: default_outbound_queue_capacity(),
            },
        }
    }
}

// Default value functions
fn default_server_host() -> String {
    "127.0.0.1".to_string()
}
fn default_server_port() -> u16 {
    8000
}
fn default_ws_scheme() -> String {
    "ws".to_string()
}
fn default_http_scheme() -> String {
    "http".to_string()
}
fn default_ws_path() -> String {
    "/ws/video".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_target_language() -> String {
    "en".to_string()
}
fn default_languages() -> Vec<String> {
    vec!["en".to_string(), "hi".to_string()]
}
fn default_frame_interval_ms() -> u64 {
    200
}
fn default_frame_quality() -> f32 {
    0.5
}
fn default_reconnect_backoff_ms() -> u64 {
    2000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}
fn default_frame_encoding() -> FrameEncoding {
    FrameEncoding::Base64
}

fn default_proximity_threshold() -> f64 {
    75.0
}
fn default_depth_unit() -> DepthUnit {
    DepthUnit::Centimeters
}
fn default_annotate_tracked_objects() -> bool {
    true
}

fn default_announce_detections() -> bool {
    false
}
fn default_proximity_warning() -> String {
    "You are too close to the object".to_string()
}

fn default_frames_dir() -> String {
    "./frames".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_outbound_queue_capacity() -> usize {
    2
}
