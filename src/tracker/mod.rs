pub mod controller;
pub mod state;
mod worker;

pub use controller::SessionController;
pub use state::{Badge, FocusStatus, FocusTracker, SignalFrame, TickOutcome, TrackerStats};
