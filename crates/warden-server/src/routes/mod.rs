//! Route modules.

pub mod health;
pub mod members;
pub mod policies;
pub mod views;
