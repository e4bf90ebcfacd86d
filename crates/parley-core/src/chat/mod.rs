//! Chat and message persistence abstractions for Parley.
//!
//! This module defines the `PersistenceClient` trait that the infrastructure
//! layer implements, and the `ChatSessionStore` that caches a user's chat list.

pub mod repository;
pub mod session_store;
