//! Warden spooler — drives projection handlers under a distributed lease.
//!
//! One loop runs per registered handler. A loop only folds events while its
//! instance holds the view's lease, and persists a watermark after every fold
//! so a crash or lease takeover resumes exactly where the last holder stopped.

pub mod config;
pub mod spooler;
pub mod status;

pub use config::SpoolerConfig;
pub use spooler::{CycleOutcome, Spooler, SpoolerHandle, ViewResets};
pub use status::{StatusBoard, ViewState, ViewStatus};
