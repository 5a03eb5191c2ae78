//! Database schema for the event log, leases and watermarks.
//!
//! The DDL lives in the workspace `migrations/` directory; this module embeds
//! it and names the tables the adapters query.

use sqlx::migrate::Migrator;

/// Every workspace migration, applied in order at startup.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Append-only event log.
pub const EVENTS_TABLE: &str = "eventstore.events";

/// Lease records keyed by view id.
pub const LOCKS_TABLE: &str = "projections.locks";

/// Per-view watermarks.
pub const CURRENT_SEQUENCES_TABLE: &str = "projections.current_sequences";

/// Advisory lock key taken by every append transaction. Serializing appends
/// makes global positions become visible in commit order, which is what lets a
/// watermark never skip an earlier, slower commit.
pub const APPEND_LOCK_KEY: i64 = 0x5741_5244_454e;
