//! Aggregates, commands and events of the policy context.

pub mod aggregates;
pub mod commands;
pub mod events;
