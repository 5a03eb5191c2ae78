//! Shared test doubles and fixtures for the Warden IAM core.

mod clock;
mod fixtures;
mod handler;
mod locker;
mod store;

pub use clock::{FixedClock, ManualClock};
pub use fixtures::stored_event;
pub use handler::{FailingHandler, RecordingHandler};
pub use locker::ScriptedLocker;
pub use store::FailingEventStore;
