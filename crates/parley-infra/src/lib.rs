//! Infrastructure layer for Parley.
//!
//! Contains implementations of the collaborator traits defined in `parley-core`:
//! SQLite persistence, the in-process realtime change feed, and response
//! generators (Google Gemini, canned demo replies). Also hosts the config
//! file loader.

pub mod config;
pub mod llm;
pub mod realtime;
pub mod sqlite;
