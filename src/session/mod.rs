//! Streaming session lifecycle.
//!
//! A single controller task owns the session state machine:
//!
//! ```text
//! Idle --start--> Connecting --opened--> Open
//!  ^                  |                   |
//!  |              open failed        closed / error / superseded
//!  |                  v                   v
//!  +------------- Idle <---- Closing <----+
//!  (reconnect timer fires after the backoff)
//!
//! any --suspend--> Suspended --resume--> Connecting
//! ```
//!
//! Every connect attempt gets a new [`Generation`]. Results tagged with an
//! older generation are discarded, and connections they carry are closed.

mod actor;
mod controller;
mod pump;
mod reconnect;
mod stats;
mod types;

pub use controller::{SessionController, SessionControllerBuilder};
pub use reconnect::ReconnectPolicy;
pub use stats::StreamStats;
pub use types::{EndpointParams, Generation, SessionSnapshot, SessionState, StreamingConfig};
