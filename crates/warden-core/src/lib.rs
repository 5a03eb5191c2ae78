//! Warden Core — event-sourcing abstractions.
//!
//! This crate defines the traits and types every other crate builds on: the
//! event store and lock contracts, aggregates, projection handlers and the
//! event registry. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod lock;
pub mod projection;
pub mod registry;
pub mod store;
pub mod watermark;
