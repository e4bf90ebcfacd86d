//! Broadcast of sync engine change events.

pub mod bus;
