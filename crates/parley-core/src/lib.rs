//! Business logic and collaborator trait definitions for Parley.
//!
//! This crate defines the "ports" (persistence, realtime feed, response
//! generator) that the infrastructure layer implements, plus the
//! conversation sync engine and chat session store built on top of them.
//! It depends only on `parley-types` -- never on `parley-infra` or any
//! database/IO crate.

pub mod chat;
pub mod event;
pub mod llm;
pub mod realtime;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;
