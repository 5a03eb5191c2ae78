//! Warden IAM — Member context.
//!
//! Users granted roles on the instance. Membership events share the `iam`
//! stream with the instance default policies.

pub mod application;
pub mod domain;
pub mod infrastructure;
