//! Realtime change-feed abstraction.

pub mod bridge;
