//! Warden IAM — Policy context.
//!
//! Lockout and org IAM policies, set on the instance (`iam`, the default) and
//! optionally overridden per organization (`org`). Commands append to the
//! owner's stream; projections fold the streams into lookup tables that fall
//! back to the instance default.

pub mod application;
pub mod domain;
pub mod infrastructure;
