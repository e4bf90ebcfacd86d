//! In-process realtime change feed.

pub mod feed;
