//! Warden event store — storage adapters for the core contracts.
//!
//! `PostgreSQL` adapters back production deployments; the in-memory adapters
//! implement the same contracts for tests and single-process setups.

pub mod error;
pub mod memory_event_store;
pub mod memory_locker;
pub mod memory_watermark_store;
pub mod pg_event_store;
pub mod pg_locker;
pub mod pg_watermark_store;
pub mod schema;
