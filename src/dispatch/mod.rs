mod dispatcher;
mod event;
mod proximity;
#[cfg(test)]
mod tests;

pub use dispatcher::{Dispatch, ResultDispatcher};
pub use event::{DepthUnit, HorizontalPosition, InboundEvent, TrackedObject};
pub use proximity::{ProximityChanged, ProximityState};
