pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod frame;
pub mod language;
pub mod lifecycle;
pub mod narration;
pub mod services;
pub mod session;
pub mod source;
pub mod transport;

pub use app::{AppComponents, ComponentState, KeyCommand, NavigatorApp, ShutdownReason};
pub use config::NavConfig;
pub use dispatch::{DepthUnit, Dispatch, InboundEvent, ResultDispatcher, TrackedObject};
pub use error::{NavError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, NavEvent};
pub use frame::{CapturedFrame, FrameEncoding, OutboundFrame};
pub use lifecycle::{LifecycleCoordinator, LifecycleSignal};
pub use narration::Narrator;
pub use session::{
    EndpointParams, Generation, ReconnectPolicy, SessionController, SessionSnapshot,
    SessionState, StreamStats, StreamingConfig,
};
pub use source::{DirectoryFrameSource, FrameSource, StaticFrameSource};
pub use transport::{
    MockTransport, SessionTransport, TransportEvent, TransportHandle, WebSocketTransport,
};
