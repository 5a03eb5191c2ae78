//! Member view storage.

pub mod memory_views;
pub mod pg_views;
pub mod views;
