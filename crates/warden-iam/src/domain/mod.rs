//! Domain layer for the member context.

pub mod aggregates;
pub mod commands;
pub mod events;
