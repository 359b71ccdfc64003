pub mod keyboard_input;

mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use keyboard_input::{KeyCommand, KeyboardInputHandler};
pub use orchestrator::{AppComponents, NavigatorApp};
pub use types::{ComponentState, ShutdownReason};
