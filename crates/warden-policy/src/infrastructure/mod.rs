//! View storage for the policy projections.

pub mod memory_views;
pub mod pg_views;
pub mod views;
