//! Command handlers, projections and read-model queries.

pub mod command_handlers;
pub mod projections;
pub mod query_handlers;
