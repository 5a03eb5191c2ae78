//! Application layer for the member context.

pub mod command_handlers;
pub mod projections;
pub mod query_handlers;
